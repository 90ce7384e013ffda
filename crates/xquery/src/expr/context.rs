use super::{Expr, Iter, ValueItems, coerce};
use crate::compiler::{CompileContext, VarMap};
use crate::engine::runtime::{Error, ErrorCode, InputInfo, QueryContext};
use crate::types::{ExprType, SeqType, Type};
use crate::xdm::{Item, Value};
use core::fmt;

/// The context value `.`.
#[derive(Debug)]
pub struct ContextValue {
    ty: ExprType,
    info: Option<InputInfo>,
}

impl ContextValue {
    pub fn new() -> Self {
        Self {
            ty: SeqType::ITEM_ZM.into(),
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }
}

impl Default for ContextValue {
    fn default() -> Self {
        Self::new()
    }
}

impl Expr for ContextValue {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        coerce::ctx_value(qc, &self.description()).map_err(|e| e.at(self.info()))
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        if let Some(focus) = cc.top_focus()
            && let Some(value) = &focus.value
        {
            let st = value.seq_type();
            self.ty = match focus.size {
                // one item at a time inside a predicate
                n if n > 1 => SeqType::one(st.ty).into(),
                _ => ExprType::sized(st.ty, value.size()),
            };
        }
        Ok(self)
    }

    fn copy(&self, _cc: &mut CompileContext<'_>, _vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(ContextValue {
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        "context value".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }

    fn is_context_value(&self) -> bool {
        true
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(".")
    }
}

/// Root of the tree containing the context node, `/`.
#[derive(Debug)]
pub struct Root {
    ty: ExprType,
    info: Option<InputInfo>,
}

impl Root {
    pub fn new() -> Self {
        Self {
            ty: SeqType::zero_or_more(Type::NODE).into(),
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }
}

impl Default for Root {
    fn default() -> Self {
        Self::new()
    }
}

impl Expr for Root {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        let value = coerce::ctx_value(qc, &self.description()).map_err(|e| e.at(self.info()))?;
        let mut roots: Vec<Item> = Vec::new();
        for item in value.iter() {
            let Item::Node(node) = &item else {
                return Err(Error::from_code(
                    ErrorCode::XPTY0020,
                    format!("Root of the context must be a node, {} found.", item.ty()),
                )
                .at(self.info()));
            };
            let root = Item::Node(node.root());
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        Ok(Value::from_items(roots))
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn optimize(self: Box<Self>, _cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        Ok(self)
    }

    fn copy(&self, _cc: &mut CompileContext<'_>, _vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(Root {
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        "root".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }

    fn is_root(&self) -> bool {
        true
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")
    }
}
