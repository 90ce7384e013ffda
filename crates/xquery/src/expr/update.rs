//! Checks that keep updating and non-updating expressions apart.

use super::Expr;
use crate::engine::runtime::Error;

/// Rejects an updating operand.
pub fn check_no_updates(expr: &dyn Expr, description: &str) -> Result<(), Error> {
    if expr.has_updates() {
        return Err(Error::up_not(description).at(expr.info()));
    }
    Ok(())
}

/// Rejects a list with any updating operand.
pub fn check_none_updates<'a>(
    ops: impl IntoIterator<Item = &'a Box<dyn Expr>>,
    description: &str,
) -> Result<(), Error> {
    ops.into_iter().try_for_each(|op| check_no_updates(&**op, description))
}

/// Rejects a list mixing updating and non-updating operands. Vacuous
/// operands fit either side.
pub fn check_all_updates<'a>(
    ops: impl IntoIterator<Item = &'a Box<dyn Expr>>,
    description: &str,
) -> Result<(), Error> {
    let mut updating = None;
    for op in ops.into_iter().filter(|op| !op.is_vacuous()) {
        let u = op.has_updates();
        match updating {
            None => updating = Some(u),
            Some(prev) if prev != u => return Err(Error::up_all(description).at(op.info())),
            Some(_) => {}
        }
    }
    Ok(())
}
