//! Type metadata recovered from a module's export names.
//!
//! A guest module describes its types through the names of its exports:
//!
//! - `demo.Greeter::on_create(Bundle)` is a method (function export). The
//!   wasm signature carries an extra leading `i32` receiver unless the method
//!   is the static constructor `new()`.
//! - `app.Component::_base:Context` is a field (global export).
//! - `demo.Greeter extends app.Component` names the direct base type.
//!
//! Member names beginning with `_` are non-public; they are stored without
//! the leading underscores and are only visible to hidden lookups.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;
use wasmtime::{ExternType, Module};

pub const EXTENDS_KEYWORD: &str = " extends ";

/// Declared parameter/field type of a member.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TypeName {
    Context,
    Application,
    Resources,
    Configuration,
    Instrumentation,
    RuntimeThread,
    Token,
    ComponentInfo,
    Intent,
    Bundle,
    CharSequence,
    Component,
    Str,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Named(String),
}

/// Wasm value kind a declared type travels as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lowered {
    I32,
    I64,
    F32,
    F64,
}

impl TypeName {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Context" => TypeName::Context,
            "Application" => TypeName::Application,
            "Resources" => TypeName::Resources,
            "Configuration" => TypeName::Configuration,
            "Instrumentation" => TypeName::Instrumentation,
            "RuntimeThread" => TypeName::RuntimeThread,
            "Token" => TypeName::Token,
            "ComponentInfo" => TypeName::ComponentInfo,
            "Intent" => TypeName::Intent,
            "Bundle" => TypeName::Bundle,
            "CharSequence" => TypeName::CharSequence,
            "Component" => TypeName::Component,
            "String" => TypeName::Str,
            "i32" | "u32" => TypeName::I32,
            "i64" | "u64" => TypeName::I64,
            "f32" => TypeName::F32,
            "f64" => TypeName::F64,
            "bool" => TypeName::Bool,
            other => TypeName::Named(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TypeName::Context => "Context",
            TypeName::Application => "Application",
            TypeName::Resources => "Resources",
            TypeName::Configuration => "Configuration",
            TypeName::Instrumentation => "Instrumentation",
            TypeName::RuntimeThread => "RuntimeThread",
            TypeName::Token => "Token",
            TypeName::ComponentInfo => "ComponentInfo",
            TypeName::Intent => "Intent",
            TypeName::Bundle => "Bundle",
            TypeName::CharSequence => "CharSequence",
            TypeName::Component => "Component",
            TypeName::Str => "String",
            TypeName::I32 => "i32",
            TypeName::I64 => "i64",
            TypeName::F32 => "f32",
            TypeName::F64 => "f64",
            TypeName::Bool => "bool",
            TypeName::Named(name) => name,
        }
    }

    pub fn lowered(&self) -> Lowered {
        match self {
            TypeName::I64 => Lowered::I64,
            TypeName::F32 => Lowered::F32,
            TypeName::F64 => Lowered::F64,
            _ => Lowered::I32,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeName::I32 | TypeName::I64 | TypeName::F32 | TypeName::F64 | TypeName::Bool
        )
    }

    /// Whether a value of type `actual` may be stored into a slot of this type.
    pub fn accepts(&self, actual: &TypeName) -> bool {
        self == actual || (*self == TypeName::Context && *actual == TypeName::Application)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Which members a lookup may see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    Hidden,
}

impl Access {
    fn allows(self, visibility: Visibility) -> bool {
        match self {
            Access::Public => visibility == Visibility::Public,
            Access::Hidden => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub owner: String,
    pub name: String,
    pub export: String,
    pub params: Vec<TypeName>,
    pub result: Option<TypeName>,
    pub visibility: Visibility,
}

impl MethodDescriptor {
    pub fn is_constructor(&self) -> bool {
        self.name == "new"
    }

    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(TypeName::as_str)
            .collect::<Vec<_>>()
            .join(",");
        match &self.result {
            Some(result) => format!("{}::{}({}) -> {}", self.owner, self.name, params, result),
            None => format!("{}::{}({})", self.owner, self.name, params),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub owner: String,
    pub name: String,
    pub export: String,
    pub ty: TypeName,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub base: Option<String>,
    pub methods: Vec<MethodDescriptor>,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn methods_named<'a>(
        &'a self,
        name: &'a str,
        access: Access,
    ) -> impl Iterator<Item = &'a MethodDescriptor> + 'a {
        self.methods
            .iter()
            .filter(move |m| m.name == name && access.allows(m.visibility))
    }

    pub fn method(
        &self,
        name: &str,
        params: &[TypeName],
        access: Access,
    ) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| {
            m.name == name && access.allows(m.visibility) && m.params.as_slice() == params
        })
    }

    pub fn field(&self, name: &str, access: Access) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == name && access.allows(f.visibility))
    }
}

/// Coarse kind of an export, enough to validate the name grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Global,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    Extends { ty: String, base: String },
    Method(MethodDescriptor),
    Field(FieldDescriptor),
}

pub fn parse_export_name(export: &str) -> Option<Symbol> {
    if let Some((ty, base)) = export.split_once(EXTENDS_KEYWORD) {
        let (ty, base) = (ty.trim(), base.trim());
        if ty.is_empty() || base.is_empty() || ty.contains("::") {
            return None;
        }
        return Some(Symbol::Extends {
            ty: ty.to_string(),
            base: base.to_string(),
        });
    }

    let (owner, member) = export.split_once("::")?;
    if owner.is_empty() {
        return None;
    }

    if let Some((raw_name, rest)) = member.split_once('(') {
        let (raw_params, tail) = rest.split_once(')')?;
        let (name, visibility) = split_visibility(raw_name)?;
        let params = raw_params
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(TypeName::parse)
            .collect();
        let tail = tail.trim();
        let result = match tail.strip_prefix("->") {
            Some(r) if !r.trim().is_empty() => Some(TypeName::parse(r)),
            Some(_) => return None,
            None if tail.is_empty() => None,
            None => return None,
        };
        return Some(Symbol::Method(MethodDescriptor {
            owner: owner.to_string(),
            name,
            export: export.to_string(),
            params,
            result,
            visibility,
        }));
    }

    let (raw_name, raw_ty) = member.split_once(':')?;
    let (name, visibility) = split_visibility(raw_name)?;
    if raw_ty.trim().is_empty() {
        return None;
    }
    Some(Symbol::Field(FieldDescriptor {
        owner: owner.to_string(),
        name,
        export: export.to_string(),
        ty: TypeName::parse(raw_ty),
        visibility,
    }))
}

fn split_visibility(raw: &str) -> Option<(String, Visibility)> {
    let raw = raw.trim();
    let stripped = raw.trim_start_matches('_');
    if stripped.is_empty() {
        return None;
    }
    let visibility = if stripped.len() == raw.len() {
        Visibility::Public
    } else {
        Visibility::Private
    };
    Some((stripped.to_string(), visibility))
}

/// All types a module declares, keyed by qualified name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    types: BTreeMap<String, TypeDescriptor>,
}

impl SymbolTable {
    pub fn from_module(module: &Module) -> Self {
        Self::from_exports(module.exports().map(|export| {
            let kind = match export.ty() {
                ExternType::Func(_) => ExportKind::Func,
                ExternType::Global(_) => ExportKind::Global,
                _ => ExportKind::Other,
            };
            (export.name().to_string(), kind)
        }))
    }

    pub fn from_exports(exports: impl IntoIterator<Item = (String, ExportKind)>) -> Self {
        let mut types: BTreeMap<String, TypeDescriptor> = BTreeMap::new();
        for (export, kind) in exports {
            match (parse_export_name(&export), kind) {
                (Some(Symbol::Extends { ty, base }), _) => {
                    types
                        .entry(ty.clone())
                        .or_insert_with(|| TypeDescriptor::named(&ty))
                        .base = Some(base);
                }
                (Some(Symbol::Method(method)), ExportKind::Func) => {
                    types
                        .entry(method.owner.clone())
                        .or_insert_with(|| TypeDescriptor::named(&method.owner))
                        .methods
                        .push(method);
                }
                (Some(Symbol::Field(field)), ExportKind::Global) => {
                    types
                        .entry(field.owner.clone())
                        .or_insert_with(|| TypeDescriptor::named(&field.owner))
                        .fields
                        .push(field);
                }
                (Some(_), kind) => {
                    tracing::debug!(%export, ?kind, "export name does not match its kind; ignored");
                }
                (None, _) => {}
            }
        }
        Self { types }
    }

    pub fn resolve(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type followed by its bases, nearest first. Stops at the first base
    /// the module does not declare, or at a cycle.
    pub fn chain(&self, name: &str) -> Vec<TypeDescriptor> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(name.to_string());
        while let Some(current) = next.take() {
            if !seen.insert(current.clone()) {
                tracing::warn!(ty = %current, "inheritance cycle in module metadata");
                break;
            }
            let Some(ty) = self.types.get(&current) else {
                break;
            };
            next = ty.base.clone();
            chain.push(ty.clone());
        }
        chain
    }
}
