use super::StandardFunc;
use crate::engine::runtime::{Error, ErrorCode, Payload, QueryContext};
use crate::expr::{Expr, coerce};
use crate::types::Type;
use crate::xdm::{AtomicValue, ExpandedName, Item};

/// Error raised by `fn:error($code?, $message?, $payload?)`.
pub(super) fn error_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Error, Error> {
    if let Some(err) = &sf.deferred {
        return Ok(err.clone());
    }
    let code = match sf.args.first() {
        None => None,
        Some(arg) => match arg.atom_item(qc)? {
            None => None,
            Some(AtomicValue::QName(q)) => Some(ExpandedName::new(
                q.ns_uri.as_ref().map(|ns| ns.to_string()),
                q.local.to_string(),
            )),
            Some(other) => return Err(Error::type_error(&Item::Atomic(other), Type::QNAME).at(sf.info())),
        },
    };
    let message = match sf.args.get(1) {
        Some(arg) => coerce::to_token(&**arg, qc)?,
        None => "Halted on error().".to_string(),
    };
    let payload = match sf.args.get(2) {
        Some(arg) => arg.value(qc)?.iter().map(Payload::Item).collect(),
        None => Vec::new(),
    };
    let err = Error::new_qname(code.unwrap_or_else(|| ErrorCode::FOER0000.qname()), message);
    Ok(err.with_payload(payload).at(sf.info()))
}
