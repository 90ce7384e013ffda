use rstest::rstest;
use xquery_core::consts::{FNS, HOF_NS};
use xquery_core::engine::functions::{Function, StandardFunc};
use xquery_core::xdm::{ExpandedName, FuncItem, QNameValue};
use xquery_core::{
    AtomicValue, Error, ErrorCode, ErrorKind, Expr, Item, QueryContext, QueryContextBuilder,
    QueryOptionsBuilder, Value, compile, evaluate,
};

fn ints(values: &[i64]) -> Box<dyn Expr> {
    Box::new(Value::from_items(values.iter().copied().map(Item::integer).collect()))
}

fn val(v: Value) -> Box<dyn Expr> {
    Box::new(v)
}

fn int_of(v: &Value) -> i64 {
    match v.first().as_ref().and_then(Item::as_atomic) {
        Some(AtomicValue::Integer(i)) => *i,
        other => panic!("integer expected, got {other:?}"),
    }
}

fn func2<F>(body: F) -> Box<dyn Expr>
where
    F: Fn(i64, i64) -> Result<Value, Error> + Send + Sync + 'static,
{
    let item = FuncItem::new(None, 2, move |args, _qc| body(int_of(&args[0]), int_of(&args[1])));
    Box::new(Value::Item(Item::Function(item)))
}

fn run(func: Function, args: Vec<Box<dyn Expr>>) -> Result<Value, Error> {
    let mut qc = QueryContext::new();
    let q = compile(Box::new(StandardFunc::new(func, args)?), &mut qc)?;
    evaluate(&q, &mut qc)
}

fn as_ints(v: &Value) -> Vec<i64> {
    v.iter()
        .map(|i| match i.as_atomic() {
            Some(AtomicValue::Integer(n)) => *n,
            other => panic!("integer expected, got {other:?}"),
        })
        .collect()
}

#[test]
fn sort_with_custom_order() {
    let desc = func2(|a, b| Ok(Value::boolean(a > b)));
    let out = run(Function::SortWith, vec![ints(&[3, 1, 4, 1, 5]), desc]).unwrap();
    assert_eq!(as_ints(&out), [5, 4, 3, 1, 1]);
}

#[test]
fn sort_with_propagates_comparator_error() {
    let failing = func2(|_, _| Err(Error::from_code(ErrorCode::FOER0000, "boom")));
    let err = run(Function::SortWith, vec![ints(&[2, 1]), failing]).unwrap_err();
    assert_eq!(err.message, "boom");
}

#[test]
fn sort_with_rejects_sequence_result() {
    let both = func2(|a, b| Ok(Value::from_items(vec![Item::integer(a), Item::integer(b)])));
    let err = run(Function::SortWith, vec![ints(&[2, 1]), both]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0006);
}

#[rstest]
#[case::pre_evaluated(1 << 18)]
#[case::unrolled(0)]
fn fold_left1_adds_up(#[case] max_preeval: u64) {
    let options = QueryOptionsBuilder::new().with_max_preeval(max_preeval).build();
    let mut qc = QueryContextBuilder::new().with_options(options).build();
    let plus = func2(|a, b| Ok(Value::integer(a + b)));
    let call = StandardFunc::new(Function::FoldLeft1, vec![ints(&[1, 2, 3, 4]), plus]).unwrap();
    let q = compile(Box::new(call), &mut qc).unwrap();
    if max_preeval == 0 {
        assert!(q.to_string().starts_with("function#2(function#2("), "{q}");
    }
    assert_eq!(evaluate(&q, &mut qc).unwrap(), Value::integer(10));
}

#[test]
fn fold_left1_on_empty_input() {
    let plus = func2(|a, b| Ok(Value::integer(a + b)));
    let err = run(Function::FoldLeft1, vec![val(Value::Empty), plus]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::EmptyInput);
}

#[test]
fn reverse_sequence() {
    let out = run(Function::Reverse, vec![ints(&[1, 2, 3])]).unwrap();
    assert_eq!(as_ints(&out), [3, 2, 1]);
}

#[test]
fn count_of_large_range() {
    let out = run(Function::Count, vec![val(Value::range(1, 1_000_000))]).unwrap();
    assert_eq!(out, Value::integer(1_000_000));
}

#[test]
fn avg_of_integers_is_decimal() {
    let out = run(Function::Avg, vec![ints(&[1, 2, 3, 4])]).unwrap();
    let avg = out.first().and_then(|i| i.as_atomic().cloned());
    assert!(matches!(avg, Some(AtomicValue::Decimal(_))));
    assert_eq!(avg.and_then(|a| a.as_f64()), Some(2.5));
}

#[test]
fn avg_of_nothing_is_empty() {
    assert_eq!(run(Function::Avg, vec![val(Value::Empty)]).unwrap(), Value::Empty);
}

#[rstest]
#[case::default_zero(vec![], Value::integer(0))]
#[case::explicit_zero(
    vec![val(Value::Item(Item::string("none")))],
    Value::Item(Item::string("none"))
)]
fn sum_of_nothing(#[case] zero: Vec<Box<dyn Expr>>, #[case] expected: Value) {
    let mut args = vec![val(Value::Empty)];
    args.extend(zero);
    assert_eq!(run(Function::Sum, args).unwrap(), expected);
}

#[test]
fn sum_treats_untyped_as_double() {
    let input = Value::from_items(vec![Item::untyped("1.5"), Item::integer(2)]);
    let out = run(Function::Sum, vec![val(input)]).unwrap();
    assert_eq!(out.first().and_then(|i| i.as_atomic().and_then(AtomicValue::as_f64)), Some(3.5));
}

#[test]
fn sum_of_untyped_and_duration_fails() {
    let input = Value::from_items(vec![Item::untyped("1"), Item::Atomic(AtomicValue::DayTimeDuration(60))]);
    let err = run(Function::Sum, vec![val(input)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ComparisonClass);
}

#[test]
fn sum_of_strings_fails() {
    let input = Value::from_items(vec![Item::string("a"), Item::string("b")]);
    let err = run(Function::Sum, vec![val(input)]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0006);
}

#[test]
fn error_without_arguments() {
    let err = run(Function::Error, vec![]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOER0000);
    assert_eq!(err.message, "Halted on error().");
}

#[test]
fn error_with_code_message_and_payload() {
    let code = AtomicValue::QName(QNameValue::new(Some("urn:app"), Some("app"), "oops"));
    let args = vec![
        val(Value::Item(Item::Atomic(code))),
        val(Value::Item(Item::string("went wrong"))),
        ints(&[7, 8]),
    ];
    let err = run(Function::Error, args).unwrap_err();
    assert_eq!(err.code, ExpandedName::new(Some("urn:app".into()), "oops"));
    assert_eq!(err.code_enum(), ErrorCode::Unknown);
    assert_eq!(err.message, "went wrong");
    assert_eq!(err.payload.len(), 2);
}

#[test]
fn error_with_non_qname_code() {
    let args = vec![val(Value::Item(Item::string("oops")))];
    let err = run(Function::Error, args).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
#[case::count(FNS, "count", 1, Some(Function::Count))]
#[case::count_wrong_arity(FNS, "count", 2, None)]
#[case::sum_with_zero(FNS, "sum", 2, Some(Function::Sum))]
#[case::error_nullary(FNS, "error", 0, Some(Function::Error))]
#[case::sort_with(HOF_NS, "sort-with", 2, Some(Function::SortWith))]
#[case::sort_with_wrong_namespace(FNS, "sort-with", 2, None)]
fn function_lookup(#[case] ns: &str, #[case] local: &str, #[case] arity: usize, #[case] expected: Option<Function>) {
    let name = ExpandedName::new(Some(ns.to_string()), local);
    assert_eq!(Function::lookup(&name, arity), expected);
}

#[test]
fn wrong_arity_is_a_static_error() {
    let err = StandardFunc::new(Function::Head, vec![]).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
}
