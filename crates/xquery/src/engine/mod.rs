pub mod evaluator;
pub mod functions;
pub mod numeric;
pub mod runtime;
