use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::consts::{CODEPOINT_URI, ERR_NS};
use crate::convert::host::{ExtensionFunction, ExtensionSignature};
use crate::engine::collation::CollationRegistry;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};

/// Canonical set of XPath/XQuery 2.0 error codes emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow
    FOCA0001, // invalid value for cast
    FOCA0002, // invalid lexical value or NaN/INF to integer
    FOCA0003, // value too large for the target integer type
    FOCH0002, // unknown collation
    FOER0000, // generic error
    FORG0001, // invalid lexical value
    FORG0003, // zero-or-one called with more than one item
    FORG0004, // one-or-more called with empty sequence
    FORG0005, // exactly-one violated
    FORG0006, // invalid argument type
    FOTY0013, // atomization of a function item
    XPTY0004, // static or dynamic type error
    XPTY0117, // untypedAtomic cast to a namespace-sensitive type
    XPDY0002, // context item undefined
    XPDY0050, // treat-as / cardinality failure on path
    XPST0003, // static error in query construction
    XPST0008, // undeclared variable
    XPST0017, // unknown function or wrong arity
    NYI0000,  // project specific: not yet implemented
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FOAR0001 => "FOAR0001",
            ErrorCode::FOAR0002 => "FOAR0002",
            ErrorCode::FOCA0001 => "FOCA0001",
            ErrorCode::FOCA0002 => "FOCA0002",
            ErrorCode::FOCA0003 => "FOCA0003",
            ErrorCode::FOCH0002 => "FOCH0002",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0003 => "FORG0003",
            ErrorCode::FORG0004 => "FORG0004",
            ErrorCode::FORG0005 => "FORG0005",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FOTY0013 => "FOTY0013",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPTY0117 => "XPTY0117",
            ErrorCode::XPDY0002 => "XPDY0002",
            ErrorCode::XPDY0050 => "XPDY0050",
            ErrorCode::XPST0003 => "XPST0003",
            ErrorCode::XPST0008 => "XPST0008",
            ErrorCode::XPST0017 => "XPST0017",
            ErrorCode::NYI0000 => "NYI0000",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// QName of this code in the xqt-errors namespace.
    pub fn qname(&self) -> ExpandedName {
        ExpandedName {
            ns_uri: Some(ERR_NS.to_string()),
            local: self.as_str().to_string(),
        }
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s.strip_prefix("err:").unwrap_or(s) {
            "FOAR0001" => FOAR0001,
            "FOAR0002" => FOAR0002,
            "FOCA0001" => FOCA0001,
            "FOCA0002" => FOCA0002,
            "FOCA0003" => FOCA0003,
            "FOCH0002" => FOCH0002,
            "FOER0000" => FOER0000,
            "FORG0001" => FORG0001,
            "FORG0003" => FORG0003,
            "FORG0004" => FORG0004,
            "FORG0005" => FORG0005,
            "FORG0006" => FORG0006,
            "FOTY0013" => FOTY0013,
            "XPTY0004" => XPTY0004,
            "XPTY0117" => XPTY0117,
            "XPDY0002" => XPDY0002,
            "XPDY0050" => XPDY0050,
            "XPST0003" => XPST0003,
            "XPST0008" => XPST0008,
            "XPST0017" => XPST0017,
            "NYI0000" => NYI0000,
            _ => Unknown,
        }
    }
}

/// Whether an error was raised while compiling (type check, optimize) or
/// while evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPhase {
    Static,
    #[default]
    Dynamic,
}

/// Position of an expression in the query text that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    pub phase: ErrorPhase,
    pub location: Option<SourceLocation>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            phase: ErrorPhase::Dynamic,
            location: None,
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    /// Error detected during static analysis.
    pub fn static_err(code: ErrorCode, msg: impl Into<String>, location: Option<SourceLocation>) -> Self {
        let mut e = Self::from_code(code, msg);
        e.phase = ErrorPhase::Static;
        e.location = location;
        e
    }

    pub fn not_implemented(feature: &str) -> Self {
        Self::from_code(ErrorCode::NYI0000, format!("not implemented: {feature}"))
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    pub fn is_static(&self) -> bool {
        self.phase == ErrorPhase::Static
    }

    /// Format the code as `err:LOCAL` or `Q{ns}local`.
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

    /// Attach a location unless one is already present.
    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        if self.location.is_none() {
            self.location = location;
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())?;
        if let Some(loc) = &self.location {
            write!(f, " at {loc}")?;
        }
        Ok(())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::from_code(ErrorCode::FORG0001, format!("invalid URI: {e}"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundarySpace {
    Preserve,
    #[default]
    Strip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstructionMode {
    #[default]
    Preserve,
    Strip,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct StaticContext {
    pub base_uri: Option<String>,
    pub default_collation: String,
    pub namespaces: NamespaceBindings,
    pub in_scope_variables: HashSet<ExpandedName>,
    /// When false every node is statically known to be untyped.
    pub schema_aware: bool,
    pub boundary_space: BoundarySpace,
    pub construction_mode: ConstructionMode,
    /// Disable to run only type checking (no rewrites).
    pub optimize: bool,
    pub extensions: HashMap<ExpandedName, ExtensionSignature>,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        ns.by_prefix
            .insert("xml".to_string(), crate::consts::XML_URI.to_string());
        ns.by_prefix.insert("xs".to_string(), crate::consts::XS.to_string());
        ns.by_prefix.insert("fn".to_string(), crate::consts::FNS.to_string());
        Self {
            base_uri: None,
            default_collation: CODEPOINT_URI.to_string(),
            namespaces: ns,
            in_scope_variables: HashSet::new(),
            schema_aware: false,
            boundary_space: BoundarySpace::default(),
            construction_mode: ConstructionMode::default(),
            optimize: true,
            extensions: HashMap::new(),
        }
    }
}

/// Builder for `StaticContext`.
///
/// Mode setters taking a keyword validate it and set exactly one mode; an
/// unknown keyword is a static error and leaves the builder unusable, so the
/// setters return `Result<Self, Error>`.
pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: StaticContext::default(),
        }
    }

    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.ctx.base_uri = Some(uri.into());
        self
    }

    pub fn with_default_collation(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_collation = uri.into();
        self
    }

    /// Register a namespace prefix. The reserved `xml` prefix cannot be rebound.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p == "xml" {
            return self;
        }
        self.ctx.namespaces.by_prefix.insert(p, uri.into());
        self
    }

    /// Register an external variable that may be referenced without a local binding.
    pub fn with_variable(mut self, name: ExpandedName) -> Self {
        self.ctx.in_scope_variables.insert(name);
        self
    }

    pub fn with_schema_awareness(mut self, schema_aware: bool) -> Self {
        self.ctx.schema_aware = schema_aware;
        self
    }

    pub fn with_optimizer(mut self, enabled: bool) -> Self {
        self.ctx.optimize = enabled;
        self
    }

    /// `declare boundary-space preserve|strip`.
    pub fn with_boundary_space(mut self, policy: &str) -> Result<Self, Error> {
        self.ctx.boundary_space = match policy {
            "preserve" => BoundarySpace::Preserve,
            "strip" => BoundarySpace::Strip,
            other => {
                return Err(Error::static_err(
                    ErrorCode::XPST0003,
                    format!("boundary-space must be 'preserve' or 'strip', got '{other}'"),
                    None,
                ));
            }
        };
        Ok(self)
    }

    /// `declare construction preserve|strip`.
    pub fn with_construction_mode(mut self, mode: &str) -> Result<Self, Error> {
        self.ctx.construction_mode = match mode {
            "preserve" => ConstructionMode::Preserve,
            "strip" => ConstructionMode::Strip,
            other => {
                return Err(Error::static_err(
                    ErrorCode::XPST0003,
                    format!("construction mode must be 'preserve' or 'strip', got '{other}'"),
                    None,
                ));
            }
        };
        Ok(self)
    }

    /// Declare the host signature of an extension function callable from queries.
    pub fn with_extension(mut self, name: ExpandedName, signature: ExtensionSignature) -> Self {
        self.ctx.extensions.insert(name, signature);
        self
    }

    pub fn build(self) -> StaticContext {
        self.ctx
    }
}

#[derive(Clone)]
pub struct DynamicContext<N> {
    pub context_item: Option<XdmItem<N>>,
    pub variables: HashMap<ExpandedName, XdmSequence<N>>,
    pub collations: Arc<CollationRegistry>,
    pub extensions: HashMap<ExpandedName, Arc<dyn ExtensionFunction<N>>>,
    pub now: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub timezone_override: Option<chrono::FixedOffset>,
}

impl<N> Default for DynamicContext<N> {
    fn default() -> Self {
        Self {
            context_item: None,
            variables: HashMap::new(),
            collations: Arc::new(CollationRegistry::default()),
            extensions: HashMap::new(),
            now: None,
            timezone_override: None,
        }
    }
}

impl<N> DynamicContext<N> {
    /// Timezone applied to date/time values without one.
    pub fn implicit_timezone(&self) -> chrono::FixedOffset {
        if let Some(tz) = self.timezone_override {
            return tz;
        }
        if let Some(now) = &self.now {
            return *now.offset();
        }
        *chrono::Local::now().offset()
    }
}

pub struct DynamicContextBuilder<N> {
    ctx: DynamicContext<N>,
}

impl<N: XdmNode> Default for DynamicContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: XdmNode> DynamicContextBuilder<N> {
    pub fn new() -> Self {
        Self {
            ctx: DynamicContext::default(),
        }
    }

    pub fn with_context_item(mut self, item: impl Into<XdmItem<N>>) -> Self {
        self.ctx.context_item = Some(item.into());
        self
    }

    pub fn with_context_node(mut self, node: N) -> Self {
        self.ctx.context_item = Some(XdmItem::Node(node));
        self
    }

    pub fn with_variable(mut self, name: ExpandedName, value: impl Into<XdmSequence<N>>) -> Self {
        self.ctx.variables.insert(name, value.into());
        self
    }

    pub fn with_collations(mut self, reg: Arc<CollationRegistry>) -> Self {
        self.ctx.collations = reg;
        self
    }

    pub fn with_extension(mut self, name: ExpandedName, function: Arc<dyn ExtensionFunction<N>>) -> Self {
        self.ctx.extensions.insert(name, function);
        self
    }

    pub fn with_now(mut self, now: chrono::DateTime<chrono::FixedOffset>) -> Self {
        self.ctx.now = Some(now);
        self
    }

    pub fn with_timezone(mut self, offset_minutes: i32) -> Self {
        if let Some(tz) = chrono::FixedOffset::east_opt(offset_minutes * 60) {
            self.ctx.timezone_override = Some(tz);
        }
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        self.ctx
    }
}
