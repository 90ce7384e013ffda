use rstest::rstest;
use xquery_core::{ErrorCode, Item, Value};

fn ints(range: std::ops::Range<i64>) -> Vec<Item> {
    range.map(Item::integer).collect()
}

fn check(value: &Value, model: &[Item]) {
    assert_eq!(value.size(), model.len() as u64);
    assert_eq!(value.to_vec(), model);
    if let Value::Tree(t) = value {
        t.check_invariants().unwrap();
    }
}

/// Deterministic linear congruential generator.
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, n: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % n.max(1)
    }
}

#[rstest]
#[case::empty(0)]
#[case::single(1)]
#[case::small(7)]
#[case::first_tree(8)]
#[case::two_leaves(31)]
#[case::deep(1000)]
fn from_items_preserves_order(#[case] n: i64) {
    let model = ints(0..n);
    let value = Value::from_items(model.clone());
    check(&value, &model);
    for pos in [0, n / 2, n - 1] {
        if pos >= 0 && pos < n {
            assert_eq!(value.item_at(pos as u64), Item::integer(pos));
        }
    }
}

#[test]
fn random_edits_match_vec_model() {
    let mut rng = Lcg(42);
    let mut model = ints(0..50);
    let mut value = Value::from_items(model.clone());
    for step in 0..600i64 {
        let size = model.len() as u64;
        match rng.below(4) {
            0 => {
                let pos = rng.below(size + 1);
                value = value.insert(pos, Item::integer(1000 + step));
                model.insert(pos as usize, Item::integer(1000 + step));
            }
            1 if size > 0 => {
                let pos = rng.below(size);
                value = value.remove(pos);
                model.remove(pos as usize);
            }
            2 => {
                let pos = rng.below(size + 1);
                let extra = ints(step * 10..step * 10 + rng.below(20) as i64);
                value = value.insert_before(pos, &Value::from_items(extra.clone()));
                let at = pos as usize;
                model.splice(at..at, extra);
            }
            _ => {
                let from = rng.below(size + 1);
                let len = rng.below(size - from + 1);
                let sub = value.sub_seq(from, len);
                check(&sub, &model[from as usize..(from + len) as usize]);
            }
        }
        check(&value, &model);
    }
}

#[rstest]
#[case::tree_tree(100, 100)]
#[case::tree_small(100, 3)]
#[case::small_tree(3, 100)]
#[case::small_small(3, 4)]
fn concat_keeps_both_halves(#[case] left: i64, #[case] right: i64) {
    let a = ints(0..left);
    let b = ints(left..left + right);
    let joined = Value::from_items(a.clone()).concat(&Value::from_items(b.clone()));
    let model: Vec<Item> = a.into_iter().chain(b).collect();
    check(&joined, &model);
}

#[test]
fn edits_leave_the_original_untouched() {
    let model = ints(0..200);
    let value = Value::from_items(model.clone());
    let _ = value.insert(100, Item::string("x"));
    let _ = value.remove(0);
    let _ = value.sub_seq(10, 50);
    let _ = value.reverse();
    check(&value, &model);
}

#[test]
fn reverse_of_tree() {
    let model = ints(0..300);
    let reversed = Value::from_items(model.clone()).reverse();
    let expected: Vec<Item> = model.into_iter().rev().collect();
    check(&reversed, &expected);
}

#[test]
fn iter_at_starts_mid_sequence() {
    let value = Value::from_items(ints(0..100));
    let rest: Vec<Item> = value.iter_at(95).collect();
    assert_eq!(rest, ints(95..100));
    assert_eq!(value.iter_at(100).count(), 0);
}

#[test]
fn adjacent_ranges_stay_ranges() {
    let joined = Value::range(1, 10).concat(&Value::range(11, 20));
    assert!(matches!(joined, Value::Range(_)));
    assert_eq!(joined, Value::range(1, 20));
    assert_eq!(Value::range(5, 4), Value::Empty);
    assert_eq!(Value::range(3, 3), Value::integer(3));
}

#[test]
fn range_up_to_largest_integer() {
    let r = Value::range(0, i64::MAX);
    assert_eq!(r.size(), 1 << 63);
    assert_eq!(r.iter().next(), Some(Item::integer(0)));
    assert_eq!(r.item_at(r.size() - 1), Item::integer(i64::MAX));
    assert_eq!(r.to_string(), format!("(0 to {})", i64::MAX));
}

#[test]
fn range_iteration_stops_at_largest_integer() {
    let r = Value::range(i64::MAX - 2, i64::MAX);
    let all: Vec<Item> = r.iter().collect();
    assert_eq!(all, [i64::MAX - 2, i64::MAX - 1, i64::MAX].map(Item::integer));
    let tail: Vec<Item> = Value::range(0, i64::MAX).iter_at((1 << 63) - 2).collect();
    assert_eq!(tail, [i64::MAX - 1, i64::MAX].map(Item::integer));
    assert_eq!(Value::range(0, i64::MAX).iter_at(1 << 63).count(), 0);
}

#[test]
fn range_from_smallest_integer() {
    let r = Value::range(i64::MIN, i64::MIN + 1);
    assert_eq!(r.to_vec(), [i64::MIN, i64::MIN + 1].map(Item::integer));
    assert_eq!(Value::range(i64::MIN, -1).size(), 1 << 63);
}

#[rstest]
#[case::full_domain(i64::MIN, i64::MAX)]
#[case::one_too_many(-1, i64::MAX)]
fn oversized_range_is_rejected(#[case] start: i64, #[case] end: i64) {
    let err = Value::try_range(start, end).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPDY0130);
}

#[test]
fn range_removal_at_ends() {
    let r = Value::range(1, 5);
    assert_eq!(r.remove(0), Value::range(2, 5));
    assert_eq!(r.remove(4), Value::range(1, 4));
    check(&r.remove(2), &[1, 2, 4, 5].map(Item::integer));
}

#[test]
#[should_panic(expected = "out of bounds")]
fn item_at_past_end_panics() {
    Value::from_items(ints(0..10)).item_at(10);
}

#[test]
fn mixed_items_have_a_common_type() {
    let v = Value::from_items(vec![Item::integer(1), Item::double(2.0)]);
    assert_eq!(v.ty(), xquery_core::Type::NUMERIC);
    assert!(!v.homogeneous());
}
