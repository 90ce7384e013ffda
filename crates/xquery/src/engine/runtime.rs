use crate::compiler::{Var, VarId};
use crate::model::Node;
use crate::types::{SeqType, Type};
use crate::xdm::{AtomicValue, ExpandedName, Item, Value};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// W3C error codes raised by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow
    FOAY0001, // array index out of bounds
    FOER0000, // fn:error default, cancellation
    FORG0001, // invalid lexical form
    FORG0006, // invalid argument type / EBV
    FOTY0013, // atomization of a function item
    XPDY0002, // focus undefined
    XPDY0130, // implementation limit exceeded
    XPST0008, // undeclared variable
    XPST0017, // unknown function or wrong arity
    XPTY0004, // type error
    XPTY0020, // context item is not a node
    XPTY0117, // untyped atom cast to a namespace-sensitive type
    XUST0001, // updating expression not allowed here
    Unknown,
}

impl ErrorCode {
    pub fn local(&self) -> &'static str {
        match self {
            ErrorCode::FOAR0001 => "FOAR0001",
            ErrorCode::FOAR0002 => "FOAR0002",
            ErrorCode::FOAY0001 => "FOAY0001",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FOTY0013 => "FOTY0013",
            ErrorCode::XPDY0002 => "XPDY0002",
            ErrorCode::XPDY0130 => "XPDY0130",
            ErrorCode::XPST0008 => "XPST0008",
            ErrorCode::XPST0017 => "XPST0017",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPTY0020 => "XPTY0020",
            ErrorCode::XPTY0117 => "XPTY0117",
            ErrorCode::XUST0001 => "XUST0001",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// QName in the `http://www.w3.org/2005/xqt-errors` namespace.
    pub fn qname(&self) -> ExpandedName {
        ExpandedName::new(Some(ERR_NS.to_string()), self.local())
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s {
            "err:FOAR0001" => FOAR0001,
            "err:FOAR0002" => FOAR0002,
            "err:FOAY0001" => FOAY0001,
            "err:FOER0000" => FOER0000,
            "err:FORG0001" => FORG0001,
            "err:FORG0006" => FORG0006,
            "err:FOTY0013" => FOTY0013,
            "err:XPDY0002" => XPDY0002,
            "err:XPDY0130" => XPDY0130,
            "err:XPST0008" => XPST0008,
            "err:XPST0017" => XPST0017,
            "err:XPTY0004" => XPTY0004,
            "err:XPTY0020" => XPTY0020,
            "err:XPTY0117" => XPTY0117,
            "err:XUST0001" => XUST0001,
            _ => Unknown,
        }
    }
}

pub use crate::consts::ERR_NS;

/// Error category, independent of the concrete W3C code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// More items than allowed.
    Cardinality,
    /// A value was required but the input was empty.
    EmptyInput,
    Cast,
    NamespaceSensitive,
    /// Operands of incompatible comparison classes.
    ComparisonClass,
    Update,
    /// Focus undefined or of the wrong kind.
    Context,
    Arithmetic,
    Dynamic,
    Cancelled,
}

/// Location of the expression that raised an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputInfo {
    pub path: Option<Arc<str>>,
    pub line: u32,
    pub column: u32,
}

impl InputInfo {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            path: None,
            line,
            column,
        }
    }

    pub fn with_path(mut self, path: impl Into<Arc<str>>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for InputInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{p}:{}:{}", self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Diagnostic value attached to an error.
#[derive(Debug, Clone)]
pub enum Payload {
    Item(Item),
    Type(Type),
    Text(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub kind: ErrorKind,
    pub message: String,
    pub info: Option<InputInfo>,
    pub payload: Vec<Payload>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

/// Largest number of characters of an item shown in an error message.
const SHOWN: usize = 64;

fn chop(s: String) -> String {
    if s.chars().count() <= SHOWN {
        return s;
    }
    let mut out: String = s.chars().take(SHOWN - 3).collect();
    out.push_str("...");
    out
}

impl Error {
    pub fn new(code: ErrorCode, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            code: code.qname(),
            kind,
            message: msg.into(),
            info: None,
            payload: Vec::new(),
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new(code, ErrorKind::Dynamic, msg)
    }

    /// Error with a user-defined QName, as raised by `fn:error`.
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            kind: ErrorKind::Dynamic,
            message: msg.into(),
            info: None,
            payload: Vec::new(),
            source: None,
        }
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&format!("err:{}", self.code.local))
        } else {
            ErrorCode::Unknown
        }
    }

    /// Code as `err:LOCAL` or `Q{ns}local`.
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else {
            self.code.to_string()
        }
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    /// Attaches a location unless one is already known.
    pub fn at(mut self, info: Option<&InputInfo>) -> Self {
        if self.info.is_none() {
            self.info = info.cloned();
        }
        self
    }

    pub(crate) fn with_payload(mut self, payload: impl IntoIterator<Item = Payload>) -> Self {
        self.payload.extend(payload);
        self
    }

    fn items_found(first: &Item, second: &Item, more: bool) -> (String, Vec<Payload>) {
        let mut shown = format!("{}, {}", chop(first.to_string()), chop(second.to_string()));
        let mut payload = vec![Payload::Item(first.clone()), Payload::Item(second.clone())];
        if more {
            shown.push_str(", ...");
            payload.push(Payload::Text("...".into()));
        }
        (shown, payload)
    }

    /// More than one item where at most one is allowed.
    pub fn seq_found(first: &Item, second: &Item, more: bool) -> Self {
        let (shown, payload) = Self::items_found(first, second, more);
        Self::new(
            ErrorCode::XPTY0004,
            ErrorKind::Cardinality,
            format!("Item expected, sequence found: ({shown})."),
        )
        .with_payload(payload)
    }

    /// Effective boolean value of a sequence starting with two non-node items.
    pub fn ebv(first: &Item, second: &Item, more: bool) -> Self {
        let (shown, payload) = Self::items_found(first, second, more);
        Self::new(
            ErrorCode::FORG0006,
            ErrorKind::Cardinality,
            format!("Effective boolean value not defined for ({shown})."),
        )
        .with_payload(payload)
    }

    pub fn empty_found(expected: Option<Type>) -> Self {
        match expected {
            Some(ty) => Self::new(
                ErrorCode::XPTY0004,
                ErrorKind::EmptyInput,
                format!("{ty} expected, empty sequence found."),
            )
            .with_payload([Payload::Type(ty)]),
            None => Self::new(
                ErrorCode::XPTY0004,
                ErrorKind::EmptyInput,
                "Item expected, empty sequence found.",
            ),
        }
    }

    /// Item of the wrong type.
    pub fn type_error(item: &Item, expected: Type) -> Self {
        let ty = item.ty();
        Self::new(
            ErrorCode::XPTY0004,
            ErrorKind::Cast,
            format!("Cannot convert {ty} to {expected}: {}.", chop(item.to_string())),
        )
        .with_payload([Payload::Item(item.clone()), Payload::Type(ty), Payload::Type(expected)])
    }

    /// Item whose lexical form does not fit the target type.
    pub fn cast(item: &Item, target: Type) -> Self {
        let ty = item.ty();
        Self::new(
            ErrorCode::FORG0001,
            ErrorKind::Cast,
            format!("Cannot cast {ty} to {target}: {}.", chop(item.to_string())),
        )
        .with_payload([Payload::Item(item.clone()), Payload::Type(ty), Payload::Type(target)])
    }

    pub fn ns_sensitive(item: &Item, target: Type) -> Self {
        Self::new(
            ErrorCode::XPTY0117,
            ErrorKind::NamespaceSensitive,
            format!("No namespace-sensitive cast from {} to {target}.", item.ty()),
        )
        .with_payload([Payload::Item(item.clone()), Payload::Type(target)])
    }

    pub fn incomparable(a: &AtomicValue, b: &AtomicValue) -> Self {
        let (ta, tb) = (Type::Atomic(a.ty()), Type::Atomic(b.ty()));
        Self::new(
            ErrorCode::XPTY0004,
            ErrorKind::ComparisonClass,
            format!("Types {ta} and {tb} are not comparable."),
        )
        .with_payload([Payload::Type(ta), Payload::Type(tb)])
    }

    /// Item outside the comparison class established by earlier items.
    pub fn comparison(expected: Type, item: &Item) -> Self {
        Self::new(
            ErrorCode::FORG0006,
            ErrorKind::ComparisonClass,
            format!("{expected} expected, {} found: {}.", item.ty(), chop(item.to_string())),
        )
        .with_payload([Payload::Type(expected), Payload::Item(item.clone())])
    }

    /// Item that cannot be summed.
    pub fn sum(item: &Item) -> Self {
        Self::new(
            ErrorCode::FORG0006,
            ErrorKind::ComparisonClass,
            format!("Numbers or durations expected, {} found.", item.ty()),
        )
        .with_payload([Payload::Item(item.clone())])
    }

    pub fn up_not(description: &str) -> Self {
        Self::new(
            ErrorCode::XUST0001,
            ErrorKind::Update,
            format!("{description}: no updating expression allowed."),
        )
    }

    pub fn up_all(description: &str) -> Self {
        Self::new(
            ErrorCode::XUST0001,
            ErrorKind::Update,
            format!("{description}: all expressions must be updating or return an empty sequence."),
        )
    }

    pub fn no_ctx(description: &str) -> Self {
        Self::new(
            ErrorCode::XPDY0002,
            ErrorKind::Context,
            format!("{description}: no context value bound."),
        )
    }

    pub fn fi_atom(item: &Item) -> Self {
        Self::new(
            ErrorCode::FOTY0013,
            ErrorKind::Cast,
            format!("Items of type {} cannot be atomized.", item.ty()),
        )
        .with_payload([Payload::Item(item.clone())])
    }

    /// Integer range with more items than a sequence can hold.
    pub fn range_size(start: i64, end: i64) -> Self {
        Self::new(
            ErrorCode::XPDY0130,
            ErrorKind::Dynamic,
            format!("Range {start} to {end} exceeds the maximum sequence size."),
        )
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FOER0000, ErrorKind::Cancelled, msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(info) = &self.info {
            write!(f, "[{info}] ")?;
        }
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}

/// Limits applied during compilation and evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Largest result size computed at compile time.
    pub max_preeval: u64,
    /// Largest sequence over which a `for` clause is unrolled.
    pub unroll_limit: u64,
    /// Characters kept of each argument of a compile trace line.
    pub info_chop: usize,
    pub timeout: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_preeval: 1 << 18,
            unroll_limit: 5,
            info_chop: 128,
            timeout: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryOptionsBuilder {
    options: QueryOptions,
}

impl QueryOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_preeval(mut self, n: u64) -> Self {
        self.options.max_preeval = n;
        self
    }

    pub fn with_unroll_limit(mut self, n: u64) -> Self {
        self.options.unroll_limit = n;
        self
    }

    pub fn with_info_chop(mut self, n: usize) -> Self {
        self.options.info_chop = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> QueryOptions {
        self.options
    }
}

/// Implicit context value, position and size.
#[derive(Debug, Clone, Default)]
pub struct QueryFocus {
    pub value: Option<Value>,
    pub pos: u64,
    pub size: u64,
}

impl QueryFocus {
    pub fn new(value: Option<Value>) -> Self {
        let size = value.as_ref().map_or(0, Value::size);
        Self {
            value,
            pos: u64::from(size > 0),
            size,
        }
    }
}

/// A recorded, not yet applied update primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingUpdate {
    Delete(Node),
}

/// Per-execution state: focus, variable bindings, pending updates and the
/// cancellation hooks polled by long-running loops.
#[derive(Debug, Default)]
pub struct QueryContext {
    focus: QueryFocus,
    vars: HashMap<VarId, Value>,
    next_var: u32,
    updates: Vec<PendingUpdate>,
    options: QueryOptions,
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
    compile_info: Vec<String>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn focus(&self) -> &QueryFocus {
        &self.focus
    }

    /// Installs a new focus and returns the previous one.
    pub fn set_focus(&mut self, focus: QueryFocus) -> QueryFocus {
        std::mem::replace(&mut self.focus, focus)
    }

    /// Declares a variable with a fresh identity.
    pub fn new_var(&mut self, name: &str, declared: Option<SeqType>) -> Var {
        let id = VarId(self.next_var);
        self.next_var += 1;
        Var::new(id, name, declared)
    }

    pub fn set_var(&mut self, var: &Var, value: Value) {
        self.vars.insert(var.id, value);
    }

    pub fn var(&self, var: &Var) -> Result<Value, Error> {
        self.vars.get(&var.id).cloned().ok_or_else(|| {
            Error::from_code(ErrorCode::XPST0008, format!("Undeclared variable: ${}.", var.name))
        })
    }

    pub fn add_update(&mut self, update: PendingUpdate) {
        self.updates.push(update);
    }

    pub fn updates(&self) -> &[PendingUpdate] {
        &self.updates
    }

    pub fn take_updates(&mut self) -> Vec<PendingUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// Starts the evaluation clock if a timeout is configured.
    pub fn start_timer(&mut self) {
        self.deadline = self.options.timeout.map(|t| Instant::now() + t);
    }

    /// Fails once the cancel flag is raised or the deadline has passed.
    pub fn check_stop(&self) -> Result<(), Error> {
        if self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
            tracing::debug!("query cancelled");
            return Err(Error::cancelled("Query was cancelled."));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::debug!("query timed out");
            return Err(Error::cancelled("Query timed out."));
        }
        Ok(())
    }

    pub(crate) fn log_info(&mut self, line: String) {
        self.compile_info.push(line);
    }

    /// Trace lines collected during compilation.
    pub fn compile_info(&self) -> &[String] {
        &self.compile_info
    }
}

#[derive(Debug, Default)]
pub struct QueryContextBuilder {
    ctx: QueryContext,
}

impl QueryContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_value(mut self, value: Value) -> Self {
        self.ctx.focus = QueryFocus::new(Some(value));
        self
    }

    pub fn with_context_item(self, item: impl Into<Item>) -> Self {
        self.with_context_value(Value::Item(item.into()))
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.ctx.cancel = Some(flag);
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.ctx.options = options;
        self
    }

    pub fn build(self) -> QueryContext {
        self.ctx
    }
}
