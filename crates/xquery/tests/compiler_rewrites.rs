use rstest::rstest;
use xquery_core::compiler::{CompileContext, Origin};
use xquery_core::engine::functions::{Function, StandardFunc};
use xquery_core::engine::numeric::Calc;
use xquery_core::expr::{Arith, CmpOp, Compare, ContextValue, DynFuncCall, Filter, For, If, Let, List, Range, VarRef};
use xquery_core::{
    ErrorCode, ErrorKind, Expr, Item, QueryContext, QueryContextBuilder, QueryOptionsBuilder, SeqType,
    Type, Value, compile, evaluate,
};

fn int(i: i64) -> Box<dyn Expr> {
    Box::new(Value::integer(i))
}

fn call(func: Function, args: Vec<Box<dyn Expr>>) -> Box<dyn Expr> {
    Box::new(StandardFunc::new(func, args).unwrap())
}

fn error_call() -> Box<dyn Expr> {
    call(Function::Error, vec![])
}

fn list(ops: Vec<Box<dyn Expr>>) -> Box<dyn Expr> {
    Box::new(List::new(ops))
}

fn ints(values: &[i64]) -> Value {
    Value::from_items(values.iter().copied().map(Item::integer).collect())
}

#[test]
fn head_ignores_error_in_tail() {
    let mut qc = QueryContext::new();
    let q = compile(call(Function::Head, vec![list(vec![int(1), error_call()])]), &mut qc).unwrap();
    assert_eq!(q.root().as_value(), Some(&Value::integer(1)));
    assert!(qc.compile_info().iter().any(|l| l.starts_with("simplify") && l.contains("head((1, error()))")));
}

#[test]
fn head_ignores_failing_arithmetic_in_tail() {
    let mut qc = QueryContext::new();
    let div: Box<dyn Expr> = Box::new(Arith::new(Calc::Div, int(1), int(0)));
    let q = compile(call(Function::Head, vec![list(vec![int(1), div])]), &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap(), Value::integer(1));
    assert!(qc.compile_info().iter().any(|l| l.starts_with("pre-evaluate")));
}

#[test]
fn failing_pre_evaluation_is_raised_at_runtime() {
    let mut qc = QueryContext::new();
    let div: Box<dyn Expr> = Box::new(Arith::new(Calc::Div, int(1), int(0)));
    let q = compile(list(vec![int(1), div]), &mut qc).unwrap();
    assert!(q.root().as_value().is_none());
    let err = evaluate(&q, &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOAR0001);
    assert_eq!(err.kind, ErrorKind::Arithmetic);
}

#[test]
fn count_keeps_erroneous_operands() {
    let mut qc = QueryContext::new();
    let q = compile(call(Function::Count, vec![list(vec![int(1), error_call()])]), &mut qc).unwrap();
    assert!(q.root().as_value().is_none());
    let err = evaluate(&q, &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOER0000);
}

#[rstest]
#[case::pre_evaluated(1 << 18)]
#[case::at_runtime(0)]
fn sum_of_range(#[case] max_preeval: u64) {
    let options = QueryOptionsBuilder::new().with_max_preeval(max_preeval).build();
    let mut qc = QueryContextBuilder::new().with_options(options).build();
    let range: Box<dyn Expr> = Box::new(Range::new(int(1), int(10)));
    let q = compile(call(Function::Sum, vec![range]), &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap(), Value::integer(55));
}

#[test]
fn head_of_range_to_largest_integer() {
    let mut qc = QueryContext::new();
    let range: Box<dyn Expr> = Box::new(Range::new(int(0), int(i64::MAX)));
    let q = compile(call(Function::Head, vec![range]), &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap(), Value::integer(0));
}

#[test]
fn range_over_all_integers_is_a_query_error() {
    let mut qc = QueryContext::new();
    let range: Box<dyn Expr> = Box::new(Range::new(int(i64::MIN), int(i64::MAX)));
    let q = compile(range, &mut qc).unwrap();
    assert!(q.root().as_value().is_none());
    let err = evaluate(&q, &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPDY0130);
}

#[test]
fn count_beyond_integer_range_fails() {
    let mut qc = QueryContext::new();
    let range: Box<dyn Expr> = Box::new(Range::new(int(i64::MIN), int(-1)));
    let q = compile(call(Function::Count, vec![range]), &mut qc).unwrap();
    let err = evaluate(&q, &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOAR0002);
}

#[test]
fn literal_list_is_pre_evaluated() {
    let mut qc = QueryContext::new();
    let q = compile(list(vec![int(1), list(vec![]), int(2), int(3)]), &mut qc).unwrap();
    assert_eq!(q.root().as_value(), Some(&ints(&[1, 2, 3])));
}

#[test]
fn single_operand_list_collapses() {
    let mut qc = QueryContext::new();
    let q = compile(list(vec![error_call()]), &mut qc).unwrap();
    assert_eq!(q.to_string(), "error()");
}

#[rstest]
#[case::unrolled(5, true)]
#[case::looped(0, false)]
fn for_over_short_literal(#[case] unroll_limit: u64, #[case] folded: bool) {
    let options = QueryOptionsBuilder::new().with_unroll_limit(unroll_limit).build();
    let mut qc = QueryContextBuilder::new().with_options(options).build();
    let x = qc.new_var("x", None);
    let body = Box::new(Arith::new(Calc::Plus, Box::new(VarRef::new(x.clone())), int(1)));
    let seq = list(vec![int(1), int(2), int(3)]);
    let q = compile(Box::new(For::new(x, seq, body)), &mut qc).unwrap();
    assert_eq!(q.root().as_value().is_some(), folded);
    assert_eq!(evaluate(&q, &mut qc).unwrap(), ints(&[2, 3, 4]));
}

#[test]
fn for_over_huge_range_has_unknown_size() {
    let mut qc = QueryContext::new();
    let x = qc.new_var("x", None);
    let seq: Box<dyn Expr> = Box::new(Value::range(1, i64::MAX));
    let expr = For::new(x, seq, Box::new(ints(&[1, 2, 3])));
    assert_eq!(expr.size(), None);
    assert_eq!(expr.seq_type(), SeqType::one_or_more(Type::INTEGER));
}

#[test]
fn list_of_huge_ranges_has_unknown_size() {
    let half = || -> Box<dyn Expr> { Box::new(Value::range(i64::MIN, -1)) };
    let expr = List::new(vec![half(), half(), int(1)]);
    assert_eq!(expr.size(), None);
    assert_eq!(expr.seq_type(), SeqType::one_or_more(Type::INTEGER));
}

#[test]
fn let_with_literal_binding_is_inlined() {
    let mut qc = QueryContext::new();
    let x = qc.new_var("x", None);
    let body = Box::new(Arith::new(Calc::Mult, Box::new(VarRef::new(x.clone())), int(2)));
    let q = compile(Box::new(Let::new(x, int(5), body)), &mut qc).unwrap();
    assert_eq!(q.root().as_value(), Some(&Value::integer(10)));
}

#[test]
fn let_with_mismatching_declared_type_fails_at_runtime() {
    let mut qc = QueryContext::new();
    let x = qc.new_var("x", Some(SeqType::one(Type::STRING)));
    let q = compile(Box::new(Let::new(x.clone(), int(5), Box::new(VarRef::new(x)))), &mut qc).unwrap();
    let err = evaluate(&q, &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
#[case::then_branch(true, 1)]
#[case::else_branch(false, 2)]
fn literal_condition_selects_branch(#[case] cond: bool, #[case] expected: i64) {
    let mut qc = QueryContext::new();
    let expr = If::new(Box::new(Value::boolean(cond)), int(1), int(2));
    let q = compile(Box::new(expr), &mut qc).unwrap();
    assert_eq!(q.root().as_value(), Some(&Value::integer(expected)));
}

#[test]
fn positional_filter_on_range() {
    let mut qc = QueryContext::new();
    let range: Box<dyn Expr> = Box::new(Range::new(int(1), int(10)));
    let q = compile(Box::new(Filter::new(range, vec![int(3)])), &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap(), Value::integer(3));
}

#[test]
fn filter_with_context_predicate() {
    let mut qc = QueryContext::new();
    let range: Box<dyn Expr> = Box::new(Range::new(int(1), int(10)));
    let pred: Box<dyn Expr> = Box::new(Compare::new(CmpOp::Gt, Box::new(ContextValue::new()), int(7)));
    let q = compile(Box::new(Filter::new(range, vec![pred])), &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap(), ints(&[8, 9, 10]));
}

#[test]
fn replacement_adopts_narrower_original_type() {
    let mut qc = QueryContext::new();
    let mut cc = CompileContext::new(&mut qc);
    let origin = Origin::of(&Value::integer(1));
    let result = cc.replace(origin, Some(Box::new(DynFuncCall::new(int(0), vec![]))));
    assert_eq!(result.seq_type(), SeqType::one(Type::INTEGER));
    assert_eq!(result.size(), Some(1));
}

#[test]
fn replacement_keeps_type_of_broader_original() {
    let mut qc = QueryContext::new();
    let mut cc = CompileContext::new(&mut qc);
    let original = DynFuncCall::new(int(0), vec![]);
    let result = cc.replace_with(&original, Some(int(4)));
    assert_eq!(result.seq_type(), SeqType::one(Type::INTEGER));
}

#[rstest]
#[case::flat(3)]
#[case::tree(40)]
fn replacement_sequence_adopts_narrower_item_type(#[case] n: i64) {
    let mut qc = QueryContext::new();
    let mut cc = CompileContext::new(&mut qc);
    let original = Range::new(int(1), int(n));
    let values: Vec<i64> = (1..=n).collect();
    let mut wide = ints(&values);
    wide.refine_type(Type::ANY_ATOMIC);
    assert_eq!(wide.ty(), Type::ANY_ATOMIC);
    let result = cc.replace_with(&original, Some(Box::new(wide)));
    let value = result.as_value().unwrap();
    assert_eq!(value.ty(), Type::INTEGER);
    assert!(!value.homogeneous());
    assert_eq!(value.size(), n as u64);
}

#[test]
fn empty_replacement_is_the_empty_sequence() {
    let mut qc = QueryContext::new();
    let mut cc = CompileContext::new(&mut qc);
    let original = DynFuncCall::new(int(0), vec![]);
    let result = cc.replace_with(&original, None);
    assert_eq!(result.as_value(), Some(&Value::Empty));
    assert!(result.seq_type().is_zero());
}

#[test]
fn identical_rewrites_are_not_traced() {
    let mut qc = QueryContext::new();
    let mut cc = CompileContext::new(&mut qc);
    let _ = cc.replace_with(&Value::integer(1), Some(int(1)));
    assert!(qc.compile_info().is_empty());
}
