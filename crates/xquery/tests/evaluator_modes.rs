use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use xquery_core::engine::numeric::Calc;
use xquery_core::engine::runtime::PendingUpdate;
use xquery_core::expr::{Arith, ContextValue, DeleteNodes, DocSource, Filter, For, If, List, Range, Root, VarRef};
use xquery_core::model::MemorySource;
use xquery_core::xdm::FuncItem;
use xquery_core::{
    ErrorCode, ErrorKind, Expr, Item, Node, NodeKind, QueryContext, QueryContextBuilder, QueryOptionsBuilder,
    SimpleNode, Value, compile, elem, evaluate, evaluate_ebv, evaluate_first, simple_doc, text,
};

fn int(i: i64) -> Box<dyn Expr> {
    Box::new(Value::integer(i))
}

fn val(v: Value) -> Box<dyn Expr> {
    Box::new(v)
}

fn range(a: i64, b: i64) -> Box<dyn Expr> {
    Box::new(Range::new(int(a), int(b)))
}

fn list(ops: Vec<Box<dyn Expr>>) -> Box<dyn Expr> {
    Box::new(List::new(ops))
}

/// `for $x in seq return $x * 2`, left unoptimized.
fn doubled(qc: &mut QueryContext, seq: Box<dyn Expr>) -> Box<dyn Expr> {
    let x = qc.new_var("x", None);
    let body = Box::new(Arith::new(Calc::Mult, Box::new(VarRef::new(x.clone())), int(2)));
    Box::new(For::new(x, seq, body))
}

fn drain(expr: &dyn Expr, qc: &mut QueryContext) -> Vec<Item> {
    let mut iter = expr.iter(qc).unwrap();
    let mut out = Vec::new();
    while let Some(item) = iter.next(qc).unwrap() {
        out.push(item);
    }
    out
}

fn sample() -> (SimpleNode, Item) {
    let doc = simple_doc().child(elem("a").child(text("x"))).build();
    let a = Item::from(doc.children()[0].clone());
    (doc, a)
}

#[rstest]
#[case::empty(val(Value::Empty), 0)]
#[case::single(int(1), 1)]
#[case::range(range(1, 5), 5)]
#[case::list(list(vec![int(1), range(2, 4), val(Value::Empty)]), 4)]
#[case::nested_list(list(vec![list(vec![int(1), int(2)]), int(3)]), 3)]
fn modes_agree(#[case] expr: Box<dyn Expr>, #[case] size: usize) {
    let mut qc = QueryContext::new();
    let value = expr.value(&mut qc).unwrap();
    assert_eq!(value.size() as usize, size);
    assert_eq!(drain(&*expr, &mut qc), value.to_vec());
    match expr.item(&mut qc) {
        Ok(item) => {
            assert!(size <= 1);
            assert_eq!(item, value.first());
        }
        Err(err) => {
            assert!(size > 1);
            assert_eq!(err.kind, ErrorKind::Cardinality);
        }
    }
}

#[test]
fn for_modes_agree() {
    let mut qc = QueryContext::new();
    let expr = doubled(&mut qc, range(1, 3));
    let value = expr.value(&mut qc).unwrap();
    assert_eq!(drain(&*expr, &mut qc), value.to_vec());
    assert_eq!(value.to_vec(), [2, 4, 6].map(Item::integer));
}

#[rstest]
#[case::empty(val(Value::Empty), false)]
#[case::zero(int(0), false)]
#[case::empty_string(val(Value::Item(Item::string(""))), false)]
#[case::string(val(Value::Item(Item::string("a"))), true)]
#[case::nan(val(Value::Item(Item::double(f64::NAN))), false)]
fn effective_boolean_value(#[case] expr: Box<dyn Expr>, #[case] expected: bool) {
    let mut qc = QueryContext::new();
    assert_eq!(expr.boolean(&mut qc).unwrap(), expected);
}

#[rstest]
#[case::value(val(Value::range(1, 2)))]
#[case::lazy_list(list(vec![int(1), int(2)]))]
fn ebv_of_atomic_sequence_fails(#[case] expr: Box<dyn Expr>) {
    let mut qc = QueryContext::new();
    let err = expr.boolean(&mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0006);
}

#[test]
fn ebv_of_sequence_starting_with_node() {
    let (_doc, a) = sample();
    let mut qc = QueryContext::new();
    let expr = list(vec![val(Value::Item(a)), int(1)]);
    assert!(expr.boolean(&mut qc).unwrap());
}

#[test]
fn ebv_of_function_item_fails() {
    let f = FuncItem::new(None, 0, |_, _| Ok(Value::Empty));
    let mut qc = QueryContext::new();
    let err = val(Value::Item(Item::Function(f))).boolean(&mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0006);
}

#[test]
fn evaluate_first_is_lazy() {
    let mut qc = QueryContext::new();
    let expr = doubled(&mut qc, range(1, 1_000_000_000_000));
    let q = compile(expr, &mut qc).unwrap();
    assert_eq!(evaluate_first(&q, &mut qc).unwrap(), Some(Item::integer(2)));
    assert!(evaluate_ebv(&q, &mut qc).is_err());
}

#[test]
fn raised_cancel_flag_stops_evaluation() {
    let flag = Arc::new(AtomicBool::new(true));
    let mut qc = QueryContextBuilder::new().with_cancel_flag(flag).build();
    let expr = doubled(&mut qc, range(1, 100));
    let q = compile(expr, &mut qc).unwrap();
    let err = evaluate(&q, &mut qc).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
}

#[test]
fn expired_timeout_stops_evaluation() {
    let options = QueryOptionsBuilder::new().with_timeout(Duration::ZERO).build();
    let mut qc = QueryContextBuilder::new().with_options(options).build();
    let expr = doubled(&mut qc, range(1, 100));
    let q = compile(expr, &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap_err().kind, ErrorKind::Cancelled);
}

#[test]
fn context_value_and_root() {
    let (doc, a) = sample();
    let mut qc = QueryContextBuilder::new().with_context_item(a.clone()).build();
    assert_eq!(ContextValue::new().value(&mut qc).unwrap(), Value::Item(a));
    let roots = Root::new().value(&mut qc).unwrap();
    assert_eq!(roots, Value::Item(Item::from(doc)));
    assert_eq!(roots.first().and_then(|r| r.as_node().map(Node::kind)), Some(NodeKind::Document));
}

#[test]
fn root_of_atomic_context_fails() {
    let mut qc = QueryContextBuilder::new().with_context_item(Item::integer(1)).build();
    let err = Root::new().value(&mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0020);
}

#[test]
fn context_value_without_focus_fails() {
    let mut qc = QueryContext::new();
    let err = ContextValue::new().value(&mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPDY0002);
}

#[test]
fn document_source_yields_documents() {
    let (doc, _) = sample();
    let data = MemorySource::new("db", [Node::from(doc)]);
    let mut qc = QueryContext::new();
    let q = compile(Box::new(DocSource::new(data)), &mut qc).unwrap();
    let out = evaluate(&q, &mut qc).unwrap();
    assert_eq!(out.size(), 1);
    assert!(q.root().data().is_some());
}

#[test]
fn deletes_are_collected() {
    let (_doc, a) = sample();
    let b = Item::from(elem("b").build());
    let mut qc = QueryContext::new();
    let ops = vec![
        Box::new(DeleteNodes::new(val(Value::Item(a.clone())))) as Box<dyn Expr>,
        Box::new(DeleteNodes::new(val(Value::Item(b)))),
    ];
    let q = compile(list(ops), &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap(), Value::Empty);
    assert_eq!(qc.updates().len(), 2);
    let Item::Node(node) = a else { panic!("node expected") };
    assert_eq!(qc.take_updates()[0], PendingUpdate::Delete(node));
    assert!(qc.updates().is_empty());
}

#[test]
fn delete_of_atomic_fails() {
    let mut qc = QueryContext::new();
    let q = compile(Box::new(DeleteNodes::new(int(1))), &mut qc).unwrap();
    assert_eq!(evaluate(&q, &mut qc).unwrap_err().code_enum(), ErrorCode::XPTY0004);
}

#[test]
fn list_mixing_updating_and_plain_operands() {
    let (_doc, a) = sample();
    let mut qc = QueryContext::new();
    let ops = vec![Box::new(DeleteNodes::new(val(Value::Item(a)))) as Box<dyn Expr>, int(1)];
    let err = compile(list(ops), &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUST0001);
    assert_eq!(err.kind, ErrorKind::Update);
}

#[test]
fn updating_branch_beside_empty_branch() {
    let (_doc, a) = sample();
    let mut qc = QueryContext::new();
    let delete = Box::new(DeleteNodes::new(val(Value::Item(a))));
    let cond = Box::new(ContextValue::new());
    assert!(compile(Box::new(If::new(cond, delete, val(Value::Empty))), &mut qc).is_ok());
}

#[test]
fn updating_filter_root_is_rejected() {
    let (_doc, a) = sample();
    let mut qc = QueryContext::new();
    let delete = Box::new(DeleteNodes::new(val(Value::Item(a))));
    let err = compile(Box::new(Filter::new(delete, vec![int(1)])), &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUST0001);
}
