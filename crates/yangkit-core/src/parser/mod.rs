//! YANG module parser.
//!
//! Two layers: a token-stream reader producing generic statements
//! (`keyword [argument] (';' | '{' ... '}')`) and a builder mapping generic
//! statements onto the typed AST. Argument handling is statement-specific,
//! so the builder knows from the keyword what the argument means; the reader
//! only handles string shapes and `+` concatenation.
//!
//! The parser is lenient: it collects diagnostics and recovers at statement
//! boundaries so one bad statement does not hide the rest of the module.

pub mod yin;

use crate::ast::*;
use crate::lexer::{
    keyword, line_at, string_value, Diagnostic, Lexer, Section, Severity, Span, StmtKind, Token,
    TokenKind,
};

/// A generic parsed statement before typed mapping.
#[derive(Clone, Debug)]
pub struct RawStmt {
    /// Keyword text, including any extension prefix.
    pub keyword: String,
    /// Recognized statement kind; `None` for prefixed extension keywords.
    pub kind: Option<StmtKind>,
    /// Argument value after quote processing and concatenation.
    pub arg: Option<String>,
    /// Substatements in source order.
    pub children: Vec<RawStmt>,
    /// Span of the keyword.
    pub span: Span,
}

/// Parse canonical YANG text into a module.
///
/// Diagnostics (including all recoverable errors) end up in
/// [`ParsedModule::diagnostics`]; the caller decides whether errors are
/// fatal.
#[must_use]
pub fn parse_module_text(source: &[u8]) -> ParsedModule {
    parse_top(source, false)
}

/// Parse canonical YANG text into a submodule.
#[must_use]
pub fn parse_submodule_text(source: &[u8]) -> ParsedModule {
    parse_top(source, true)
}

fn parse_top(source: &[u8], want_submodule: bool) -> ParsedModule {
    let mut reader = Reader::new(source);
    let raw = reader.read_stmt();

    // Anything after the closing brace is junk.
    if raw.is_some() && reader.peek().kind != TokenKind::Eof {
        let span = reader.peek().span;
        reader.error(span, "trailing content after module statement");
    }
    let mut diagnostics = std::mem::take(&mut reader.diagnostics);

    let Some(raw) = raw else {
        let mut module = ParsedModule::default();
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            span: Span::new(0, 0),
            message: "empty input, expected a module statement".into(),
        });
        module.diagnostics = diagnostics;
        return module;
    };

    build_parsed(source, raw, want_submodule, diagnostics)
}

/// Map a generic statement tree onto the typed AST. Shared by the YANG and
/// YIN front ends.
pub(crate) fn build_parsed(
    source: &[u8],
    raw: RawStmt,
    want_submodule: bool,
    diagnostics: Vec<Diagnostic>,
) -> ParsedModule {
    let mut builder = Builder {
        source,
        diagnostics,
    };
    let mut module = builder.build_module(raw, want_submodule);
    module.diagnostics = builder.diagnostics;
    module
}

// ============================================================================
// Generic statement reader
// ============================================================================

struct Reader<'src> {
    source: &'src [u8],
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Reader<'src> {
    fn new(source: &'src [u8]) -> Self {
        let (tokens, diagnostics) = Lexer::new(source).tokenize();
        Self {
            source,
            tokens,
            pos: 0,
            diagnostics,
        }
    }

    fn peek(&self) -> Token {
        self.tokens.get(self.pos).copied().unwrap_or(Token::new(
            TokenKind::Eof,
            Span::new(self.source.len() as u32, self.source.len() as u32),
        ))
    }

    fn advance(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        let line = line_at(self.source, span.start);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            span,
            message: format!("{message} (line {line})"),
        });
    }

    /// Read one statement, or `None` on unrecoverable position.
    fn read_stmt(&mut self) -> Option<RawStmt> {
        let kw_token = self.peek();
        if kw_token.kind != TokenKind::BareString {
            self.error(kw_token.span, "expected a statement keyword");
            self.recover();
            return None;
        }
        self.advance();

        let keyword = string_value(self.source, kw_token);
        let kind = keyword::lookup(&keyword);
        if kind.is_none() && !keyword.contains(':') {
            self.error(
                kw_token.span,
                format!("invalid keyword \"{keyword}\""),
            );
            self.recover();
            return None;
        }

        let arg = self.read_argument();

        let mut children = Vec::new();
        match self.peek().kind {
            TokenKind::Semicolon => {
                self.advance();
            }
            TokenKind::LBrace => {
                self.advance();
                loop {
                    match self.peek().kind {
                        TokenKind::RBrace => {
                            self.advance();
                            break;
                        }
                        TokenKind::Eof => {
                            let span = self.peek().span;
                            self.error(span, format!("unterminated \"{keyword}\" block"));
                            break;
                        }
                        _ => {
                            if let Some(child) = self.read_stmt() {
                                children.push(child);
                            }
                        }
                    }
                }
            }
            _ => {
                let span = self.peek().span;
                self.error(span, format!("expected ';' or '{{' after \"{keyword}\""));
                self.recover();
            }
        }

        Some(RawStmt {
            keyword,
            kind,
            arg,
            children,
            span: kw_token.span,
        })
    }

    /// Read an optional argument: one bare string, or quoted fragments joined
    /// by `+`.
    fn read_argument(&mut self) -> Option<String> {
        let first = self.peek();
        if !first.kind.is_string() {
            return None;
        }
        self.advance();
        let mut value = string_value(self.source, first);

        if first.kind == TokenKind::BareString {
            return Some(value);
        }
        while self.peek().kind == TokenKind::Plus {
            self.advance();
            let fragment = self.peek();
            if !fragment.kind.is_string() || fragment.kind == TokenKind::BareString {
                self.error(fragment.span, "expected a quoted string after '+'");
                break;
            }
            self.advance();
            value.push_str(&string_value(self.source, fragment));
        }
        Some(value)
    }

    /// Skip to the next statement boundary.
    fn recover(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    break;
                }
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

// ============================================================================
// Typed builder
// ============================================================================

struct Builder<'src> {
    source: &'src [u8],
    diagnostics: Vec<Diagnostic>,
}

impl Builder<'_> {
    fn error(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        let line = line_at(self.source, span.start);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            span,
            message: format!("{message} (line {line})"),
        });
    }

    fn arg(&mut self, stmt: &RawStmt) -> String {
        match &stmt.arg {
            Some(arg) => arg.clone(),
            None => {
                self.error(
                    stmt.span,
                    format!("statement \"{}\" is missing its argument", stmt.keyword),
                );
                String::new()
            }
        }
    }

    fn set_once<T>(&mut self, slot: &mut Option<T>, value: T, stmt: &RawStmt) {
        if slot.is_some() {
            self.error(
                stmt.span,
                format!("duplicate \"{}\" statement", stmt.keyword),
            );
        } else {
            *slot = Some(value);
        }
    }

    fn parse_bool(&mut self, stmt: &RawStmt) -> Option<bool> {
        let arg = self.arg(stmt);
        match arg.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => {
                self.error(
                    stmt.span,
                    format!("invalid \"{}\" value \"{arg}\"", stmt.keyword),
                );
                None
            }
        }
    }

    fn parse_status(&mut self, stmt: &RawStmt) -> AstStatus {
        let arg = self.arg(stmt);
        match arg.as_str() {
            "current" => AstStatus::Current,
            "deprecated" => AstStatus::Deprecated,
            "obsolete" => AstStatus::Obsolete,
            _ => {
                self.error(stmt.span, format!("invalid \"status\" value \"{arg}\""));
                AstStatus::Current
            }
        }
    }

    fn parse_ordered_by(&mut self, stmt: &RawStmt) -> AstOrderedBy {
        let arg = self.arg(stmt);
        match arg.as_str() {
            "system" => AstOrderedBy::System,
            "user" => AstOrderedBy::User,
            _ => {
                self.error(stmt.span, format!("invalid \"ordered-by\" value \"{arg}\""));
                AstOrderedBy::System
            }
        }
    }

    fn parse_u32(&mut self, stmt: &RawStmt) -> Option<u32> {
        let arg = self.arg(stmt);
        match arg.parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.error(
                    stmt.span,
                    format!("invalid \"{}\" value \"{arg}\"", stmt.keyword),
                );
                None
            }
        }
    }

    /// `max-elements` accepts "unbounded".
    fn parse_max_elements(&mut self, stmt: &RawStmt) -> Option<u32> {
        let arg = self.arg(stmt);
        if arg == "unbounded" {
            return None;
        }
        match arg.parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.error(stmt.span, format!("invalid \"max-elements\" value \"{arg}\""));
                None
            }
        }
    }

    fn ext_instance(&mut self, stmt: RawStmt) -> AstExtInstance {
        let (prefix, kw) = stmt
            .keyword
            .split_once(':')
            .map(|(p, k)| (p.to_owned(), k.to_owned()))
            .unwrap_or_else(|| (String::new(), stmt.keyword.clone()));
        let substmts = stmt
            .children
            .into_iter()
            .map(|child| self.ext_instance(child))
            .collect();
        AstExtInstance {
            prefix,
            keyword: kw,
            argument: stmt.arg,
            substmts,
            span: stmt.span,
        }
    }

    // === Module ===

    fn build_module(&mut self, raw: RawStmt, want_submodule: bool) -> ParsedModule {
        let mut module = ParsedModule {
            span: raw.span,
            ..ParsedModule::default()
        };

        match (raw.kind, want_submodule) {
            (Some(StmtKind::Module), false) => {}
            (Some(StmtKind::Submodule), true) => module.is_submodule = true,
            _ => {
                self.error(
                    raw.span,
                    format!(
                        "expected \"{}\", found \"{}\"",
                        if want_submodule { "submodule" } else { "module" },
                        raw.keyword
                    ),
                );
                return module;
            }
        }
        module.name = raw.arg.clone().unwrap_or_default();
        if module.name.is_empty() {
            self.error(raw.span, "module is missing its name");
        }

        // Coarse section ordering: header -> linkage -> meta -> revision ->
        // body. A statement whose section precedes the maximum seen so far is
        // out of order.
        let mut max_section = Section::Header;

        for child in raw.children {
            let Some(kind) = child.kind else {
                let inst = self.ext_instance(child);
                module.ext_instances.push(inst);
                continue;
            };

            let section = kind.section();
            if section < max_section {
                self.error(
                    child.span,
                    format!(
                        "\"{}\" statement out of order within the module",
                        child.keyword
                    ),
                );
                continue;
            }
            max_section = max_section.max(section);

            match kind {
                StmtKind::YangVersion => {
                    let arg = self.arg(&child);
                    match arg.as_str() {
                        "1" => module.yang_version = YangVersion::V1,
                        "1.1" => module.yang_version = YangVersion::V1_1,
                        _ => {
                            self.error(
                                child.span,
                                format!("invalid \"yang-version\" value \"{arg}\""),
                            );
                        }
                    }
                }
                StmtKind::Namespace => {
                    let value = self.arg(&child);
                    self.set_once(&mut module.namespace, value, &child);
                }
                StmtKind::Prefix => {
                    let value = self.arg(&child);
                    self.set_once(&mut module.prefix, value, &child);
                }
                StmtKind::BelongsTo => {
                    let target = self.arg(&child);
                    let mut prefix = None;
                    for sub in &child.children {
                        if sub.kind == Some(StmtKind::Prefix) {
                            let value = self.arg(sub);
                            self.set_once(&mut prefix, value, sub);
                        }
                    }
                    let Some(prefix) = prefix else {
                        self.error(child.span, "\"belongs-to\" requires a \"prefix\"");
                        continue;
                    };
                    self.set_once(&mut module.belongs_to, (target, prefix), &child);
                }
                StmtKind::Import => {
                    let import = self.build_import(child);
                    module.imports.push(import);
                }
                StmtKind::Include => {
                    let target = self.arg(&child);
                    let mut revision_date = None;
                    for sub in &child.children {
                        if sub.kind == Some(StmtKind::RevisionDate) {
                            let value = self.arg(sub);
                            self.set_once(&mut revision_date, value, sub);
                        }
                    }
                    module.includes.push(AstInclude {
                        module: target,
                        revision_date,
                        span: child.span,
                    });
                }
                StmtKind::Organization => {
                    let value = self.arg(&child);
                    self.set_once(&mut module.organization, value, &child);
                }
                StmtKind::Contact => {
                    let value = self.arg(&child);
                    self.set_once(&mut module.contact, value, &child);
                }
                StmtKind::Description => {
                    let value = self.arg(&child);
                    self.set_once(&mut module.description, value, &child);
                }
                StmtKind::Reference => {
                    let value = self.arg(&child);
                    self.set_once(&mut module.reference, value, &child);
                }
                StmtKind::Revision => {
                    let revision = self.build_revision(child);
                    module.revisions.push(revision);
                }
                StmtKind::Feature => {
                    let feature = self.build_feature(child);
                    module.features.push(feature);
                }
                StmtKind::Identity => {
                    let identity = self.build_identity(child);
                    module.identities.push(identity);
                }
                StmtKind::Typedef => {
                    let typedef = self.build_typedef(child);
                    module.typedefs.push(typedef);
                }
                StmtKind::Grouping => {
                    let grouping = self.build_grouping(child);
                    module.groupings.push(grouping);
                }
                StmtKind::Extension => {
                    let ext = self.build_extension_def(child);
                    module.extensions.push(ext);
                }
                StmtKind::Augment => {
                    let augment = self.build_augment(child);
                    module.augments.push(augment);
                }
                StmtKind::Deviation => {
                    let deviation = self.build_deviation(child);
                    module.deviations.push(deviation);
                }
                StmtKind::Rpc => {
                    let rpc = self.build_rpc(child);
                    module.rpcs.push(rpc);
                }
                StmtKind::Notification => {
                    let notification = self.build_notification(child);
                    module.notifications.push(notification);
                }
                _ if kind.is_data_def() => {
                    if let Some(node) = self.build_node(child) {
                        module.body.push(node);
                    }
                }
                _ => {
                    self.error(
                        child.span,
                        format!("statement \"{}\" not allowed at module level", child.keyword),
                    );
                }
            }
        }

        if !module.is_submodule {
            if module.namespace.is_none() {
                self.error(module.span, "module is missing its \"namespace\"");
            }
            if module.prefix.is_none() {
                self.error(module.span, "module is missing its \"prefix\"");
            }
        } else if module.belongs_to.is_none() {
            self.error(module.span, "submodule is missing its \"belongs-to\"");
        }

        module
    }

    fn build_import(&mut self, stmt: RawStmt) -> AstImport {
        let target = self.arg(&stmt);
        let mut prefix = None;
        let mut revision_date = None;
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::Prefix) => {
                    let value = self.arg(sub);
                    self.set_once(&mut prefix, value, sub);
                }
                Some(StmtKind::RevisionDate) => {
                    let value = self.arg(sub);
                    self.set_once(&mut revision_date, value, sub);
                }
                Some(StmtKind::Description | StmtKind::Reference) | None => {}
                _ => self.error(sub.span, "invalid substatement of \"import\""),
            }
        }
        if prefix.is_none() {
            self.error(stmt.span, "\"import\" requires a \"prefix\"");
        }
        AstImport {
            module: target,
            prefix: prefix.unwrap_or_default(),
            revision_date,
            span: stmt.span,
        }
    }

    fn build_revision(&mut self, stmt: RawStmt) -> AstRevision {
        let date = self.arg(&stmt);
        let mut description = None;
        let mut reference = None;
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::Description) => {
                    let value = self.arg(sub);
                    self.set_once(&mut description, value, sub);
                }
                Some(StmtKind::Reference) => {
                    let value = self.arg(sub);
                    self.set_once(&mut reference, value, sub);
                }
                _ => {}
            }
        }
        AstRevision {
            date,
            description,
            reference,
        }
    }

    fn build_feature(&mut self, stmt: RawStmt) -> AstFeature {
        let name = self.arg(&stmt);
        let mut feature = AstFeature {
            name,
            if_features: Vec::new(),
            status: AstStatus::Current,
            description: None,
        };
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::IfFeature) => {
                    let value = self.arg(sub);
                    feature.if_features.push(value);
                }
                Some(StmtKind::Status) => feature.status = self.parse_status(sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(sub);
                    self.set_once(&mut feature.description, value, sub);
                }
                _ => {}
            }
        }
        feature
    }

    fn build_identity(&mut self, stmt: RawStmt) -> AstIdentity {
        let name = self.arg(&stmt);
        let mut identity = AstIdentity {
            name,
            bases: Vec::new(),
            if_features: Vec::new(),
            status: AstStatus::Current,
            description: None,
            span: stmt.span,
        };
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::Base) => {
                    let value = self.arg(sub);
                    identity.bases.push(value);
                }
                Some(StmtKind::IfFeature) => {
                    let value = self.arg(sub);
                    identity.if_features.push(value);
                }
                Some(StmtKind::Status) => identity.status = self.parse_status(sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(sub);
                    self.set_once(&mut identity.description, value, sub);
                }
                _ => {}
            }
        }
        identity
    }

    fn build_typedef(&mut self, stmt: RawStmt) -> AstTypedef {
        let name = self.arg(&stmt);
        let span = stmt.span;
        let mut ty = None;
        let mut units = None;
        let mut default = None;
        let mut status = AstStatus::Current;
        let mut description = None;
        let mut reference = None;
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::Type) => {
                    let value = self.build_type(sub);
                    if ty.is_some() {
                        self.error(span, "duplicate \"type\" statement");
                    } else {
                        ty = Some(value);
                    }
                }
                Some(StmtKind::Units) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut units, value, &sub);
                }
                Some(StmtKind::Default) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut default, value, &sub);
                }
                Some(StmtKind::Status) => status = self.parse_status(&sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut description, value, &sub);
                }
                Some(StmtKind::Reference) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut reference, value, &sub);
                }
                _ => {}
            }
        }
        if ty.is_none() {
            self.error(span, "\"typedef\" requires a \"type\"");
        }
        AstTypedef {
            name,
            ty: ty.unwrap_or_default(),
            units,
            default,
            status,
            description,
            reference,
            span,
        }
    }

    fn build_type(&mut self, stmt: RawStmt) -> AstType {
        let name = self.arg(&stmt);
        let mut ty = AstType {
            name,
            span: stmt.span,
            ..AstType::default()
        };
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::Range) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut ty.range, value, &sub);
                }
                Some(StmtKind::Length) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut ty.length, value, &sub);
                }
                Some(StmtKind::Pattern) => {
                    let pattern = self.build_pattern(sub);
                    ty.patterns.push(pattern);
                }
                Some(StmtKind::FractionDigits) => {
                    if let Some(v) = self.parse_u32(&sub) {
                        if (1..=18).contains(&v) {
                            ty.fraction_digits = Some(v as u8);
                        } else {
                            self.error(sub.span, "\"fraction-digits\" must be 1..18");
                        }
                    }
                }
                Some(StmtKind::Path) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut ty.path, value, &sub);
                }
                Some(StmtKind::RequireInstance) => {
                    ty.require_instance = self.parse_bool(&sub);
                }
                Some(StmtKind::Base) => {
                    let value = self.arg(&sub);
                    ty.bases.push(value);
                }
                Some(StmtKind::Enum) => {
                    let item = self.build_enum_item(sub);
                    ty.enums.push(item);
                }
                Some(StmtKind::Bit) => {
                    let item = self.build_bit_item(sub);
                    ty.bits.push(item);
                }
                Some(StmtKind::Type) => {
                    let member = self.build_type(sub);
                    ty.union.push(member);
                }
                _ => {}
            }
        }
        ty
    }

    fn build_pattern(&mut self, stmt: RawStmt) -> AstPattern {
        let expr = self.arg(&stmt);
        let mut pattern = AstPattern {
            expr,
            invert: false,
            error_message: None,
            error_app_tag: None,
        };
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::Modifier) => {
                    let value = self.arg(sub);
                    if value == "invert-match" {
                        pattern.invert = true;
                    } else {
                        self.error(sub.span, format!("invalid \"modifier\" value \"{value}\""));
                    }
                }
                Some(StmtKind::ErrorMessage) => {
                    let value = self.arg(sub);
                    self.set_once(&mut pattern.error_message, value, sub);
                }
                Some(StmtKind::ErrorAppTag) => {
                    let value = self.arg(sub);
                    self.set_once(&mut pattern.error_app_tag, value, sub);
                }
                _ => {}
            }
        }
        pattern
    }

    fn build_enum_item(&mut self, stmt: RawStmt) -> AstEnumItem {
        let name = self.arg(&stmt);
        let mut item = AstEnumItem {
            name,
            value: None,
            status: AstStatus::Current,
            description: None,
        };
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::Value) => {
                    let arg = self.arg(sub);
                    match arg.parse::<i32>() {
                        Ok(v) => item.value = Some(v),
                        Err(_) => {
                            self.error(sub.span, format!("invalid enum \"value\" \"{arg}\""));
                        }
                    }
                }
                Some(StmtKind::Status) => item.status = self.parse_status(sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(sub);
                    self.set_once(&mut item.description, value, sub);
                }
                _ => {}
            }
        }
        item
    }

    fn build_bit_item(&mut self, stmt: RawStmt) -> AstBitItem {
        let name = self.arg(&stmt);
        let mut item = AstBitItem {
            name,
            position: None,
            status: AstStatus::Current,
            description: None,
        };
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::Position) => item.position = self.parse_u32(sub),
                Some(StmtKind::Status) => item.status = self.parse_status(sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(sub);
                    self.set_once(&mut item.description, value, sub);
                }
                _ => {}
            }
        }
        item
    }

    fn build_must(&mut self, stmt: RawStmt) -> AstMust {
        let cond = self.arg(&stmt);
        let mut must = AstMust {
            cond,
            error_message: None,
            error_app_tag: None,
        };
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::ErrorMessage) => {
                    let value = self.arg(sub);
                    self.set_once(&mut must.error_message, value, sub);
                }
                Some(StmtKind::ErrorAppTag) => {
                    let value = self.arg(sub);
                    self.set_once(&mut must.error_app_tag, value, sub);
                }
                _ => {}
            }
        }
        must
    }

    fn build_grouping(&mut self, stmt: RawStmt) -> AstGrouping {
        let name = self.arg(&stmt);
        let span = stmt.span;
        let mut grouping = AstGrouping {
            name,
            status: AstStatus::Current,
            description: None,
            typedefs: Vec::new(),
            groupings: Vec::new(),
            children: Vec::new(),
            span,
        };
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::Status) => grouping.status = self.parse_status(&sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut grouping.description, value, &sub);
                }
                Some(StmtKind::Reference) => {}
                Some(StmtKind::Typedef) => {
                    let typedef = self.build_typedef(sub);
                    grouping.typedefs.push(typedef);
                }
                Some(StmtKind::Grouping) => {
                    let nested = self.build_grouping(sub);
                    grouping.groupings.push(nested);
                }
                Some(kind) if kind.is_data_def() => {
                    if let Some(node) = self.build_node(sub) {
                        grouping.children.push(node);
                    }
                }
                _ => {}
            }
        }
        grouping
    }

    fn build_extension_def(&mut self, stmt: RawStmt) -> AstExtensionDef {
        let name = self.arg(&stmt);
        let mut ext = AstExtensionDef {
            name,
            argument: None,
            status: AstStatus::Current,
            description: None,
        };
        for sub in &stmt.children {
            match sub.kind {
                Some(StmtKind::Argument) => {
                    let arg_name = self.arg(sub);
                    let mut yin = false;
                    for arg_sub in &sub.children {
                        if arg_sub.kind == Some(StmtKind::YinElement) {
                            yin = self.parse_bool(arg_sub).unwrap_or(false);
                        }
                    }
                    self.set_once(&mut ext.argument, (arg_name, yin), sub);
                }
                Some(StmtKind::Status) => ext.status = self.parse_status(sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(sub);
                    self.set_once(&mut ext.description, value, sub);
                }
                _ => {}
            }
        }
        ext
    }

    // === Data definitions ===

    /// Collect substatements common to all data-definition statements,
    /// returning the ones the caller must handle itself.
    fn split_common(&mut self, stmt: RawStmt) -> (AstNodeCommon, Vec<RawStmt>) {
        let name = stmt.arg.clone().unwrap_or_default();
        if name.is_empty() && stmt.kind != Some(StmtKind::Input) && stmt.kind != Some(StmtKind::Output)
        {
            self.error(
                stmt.span,
                format!("statement \"{}\" is missing its argument", stmt.keyword),
            );
        }
        let mut common = AstNodeCommon {
            name,
            span: stmt.span,
            ..AstNodeCommon::default()
        };
        let mut rest = Vec::new();
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::When) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut common.when, value, &sub);
                }
                Some(StmtKind::IfFeature) => {
                    let value = self.arg(&sub);
                    common.if_features.push(value);
                }
                Some(StmtKind::Config) => {
                    common.config = self.parse_bool(&sub);
                }
                Some(StmtKind::Status) => common.status = self.parse_status(&sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut common.description, value, &sub);
                }
                Some(StmtKind::Reference) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut common.reference, value, &sub);
                }
                None => {
                    let inst = self.ext_instance(sub);
                    common.ext_instances.push(inst);
                }
                _ => rest.push(sub),
            }
        }
        (common, rest)
    }

    fn build_node(&mut self, stmt: RawStmt) -> Option<AstNode> {
        let kind = stmt.kind?;
        let span = stmt.span;
        let keyword = stmt.keyword.clone();
        let (common, rest) = self.split_common(stmt);

        match kind {
            StmtKind::Container => {
                let mut node = AstContainer {
                    common,
                    presence: None,
                    musts: Vec::new(),
                    typedefs: Vec::new(),
                    groupings: Vec::new(),
                    children: Vec::new(),
                    actions: Vec::new(),
                    notifications: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(StmtKind::Presence) => {
                            let value = self.arg(&sub);
                            self.set_once(&mut node.presence, value, &sub);
                        }
                        Some(StmtKind::Must) => {
                            let must = self.build_must(sub);
                            node.musts.push(must);
                        }
                        Some(StmtKind::Typedef) => {
                            let typedef = self.build_typedef(sub);
                            node.typedefs.push(typedef);
                        }
                        Some(StmtKind::Grouping) => {
                            let grouping = self.build_grouping(sub);
                            node.groupings.push(grouping);
                        }
                        Some(StmtKind::Action) => {
                            let action = self.build_rpc(sub);
                            node.actions.push(action);
                        }
                        Some(StmtKind::Notification) => {
                            let notification = self.build_notification(sub);
                            node.notifications.push(notification);
                        }
                        Some(k) if k.is_data_def() => {
                            if let Some(child) = self.build_node(sub) {
                                node.children.push(child);
                            }
                        }
                        _ => self.invalid_sub(&sub, "container"),
                    }
                }
                Some(AstNode::Container(node))
            }
            StmtKind::Leaf => {
                let mut ty = None;
                let mut node = AstLeaf {
                    common,
                    ty: AstType::default(),
                    units: None,
                    default: None,
                    mandatory: None,
                    musts: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(StmtKind::Type) => {
                            let value = self.build_type(sub);
                            if ty.is_some() {
                                self.error(span, "duplicate \"type\" statement");
                            } else {
                                ty = Some(value);
                            }
                        }
                        Some(StmtKind::Units) => {
                            let value = self.arg(&sub);
                            self.set_once(&mut node.units, value, &sub);
                        }
                        Some(StmtKind::Default) => {
                            let value = self.arg(&sub);
                            self.set_once(&mut node.default, value, &sub);
                        }
                        Some(StmtKind::Mandatory) => node.mandatory = self.parse_bool(&sub),
                        Some(StmtKind::Must) => {
                            let must = self.build_must(sub);
                            node.musts.push(must);
                        }
                        _ => self.invalid_sub(&sub, "leaf"),
                    }
                }
                match ty {
                    Some(ty) => node.ty = ty,
                    None => self.error(span, "\"leaf\" requires a \"type\""),
                }
                Some(AstNode::Leaf(node))
            }
            StmtKind::LeafList => {
                let mut ty = None;
                let mut node = AstLeafList {
                    common,
                    ty: AstType::default(),
                    units: None,
                    defaults: Vec::new(),
                    min_elements: None,
                    max_elements: None,
                    ordered_by: AstOrderedBy::System,
                    musts: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(StmtKind::Type) => {
                            let value = self.build_type(sub);
                            if ty.is_some() {
                                self.error(span, "duplicate \"type\" statement");
                            } else {
                                ty = Some(value);
                            }
                        }
                        Some(StmtKind::Units) => {
                            let value = self.arg(&sub);
                            self.set_once(&mut node.units, value, &sub);
                        }
                        Some(StmtKind::Default) => {
                            let value = self.arg(&sub);
                            node.defaults.push(value);
                        }
                        Some(StmtKind::MinElements) => node.min_elements = self.parse_u32(&sub),
                        Some(StmtKind::MaxElements) => {
                            node.max_elements = self.parse_max_elements(&sub);
                        }
                        Some(StmtKind::OrderedBy) => node.ordered_by = self.parse_ordered_by(&sub),
                        Some(StmtKind::Must) => {
                            let must = self.build_must(sub);
                            node.musts.push(must);
                        }
                        _ => self.invalid_sub(&sub, "leaf-list"),
                    }
                }
                match ty {
                    Some(ty) => node.ty = ty,
                    None => self.error(span, "\"leaf-list\" requires a \"type\""),
                }
                Some(AstNode::LeafList(node))
            }
            StmtKind::List => {
                let mut node = AstList {
                    common,
                    key: None,
                    uniques: Vec::new(),
                    min_elements: None,
                    max_elements: None,
                    ordered_by: AstOrderedBy::System,
                    musts: Vec::new(),
                    typedefs: Vec::new(),
                    groupings: Vec::new(),
                    children: Vec::new(),
                    actions: Vec::new(),
                    notifications: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(StmtKind::Key) => {
                            let value = self.arg(&sub);
                            self.set_once(&mut node.key, value, &sub);
                        }
                        Some(StmtKind::Unique) => {
                            let value = self.arg(&sub);
                            node.uniques.push(value);
                        }
                        Some(StmtKind::MinElements) => node.min_elements = self.parse_u32(&sub),
                        Some(StmtKind::MaxElements) => {
                            node.max_elements = self.parse_max_elements(&sub);
                        }
                        Some(StmtKind::OrderedBy) => node.ordered_by = self.parse_ordered_by(&sub),
                        Some(StmtKind::Must) => {
                            let must = self.build_must(sub);
                            node.musts.push(must);
                        }
                        Some(StmtKind::Typedef) => {
                            let typedef = self.build_typedef(sub);
                            node.typedefs.push(typedef);
                        }
                        Some(StmtKind::Grouping) => {
                            let grouping = self.build_grouping(sub);
                            node.groupings.push(grouping);
                        }
                        Some(StmtKind::Action) => {
                            let action = self.build_rpc(sub);
                            node.actions.push(action);
                        }
                        Some(StmtKind::Notification) => {
                            let notification = self.build_notification(sub);
                            node.notifications.push(notification);
                        }
                        Some(k) if k.is_data_def() => {
                            if let Some(child) = self.build_node(sub) {
                                node.children.push(child);
                            }
                        }
                        _ => self.invalid_sub(&sub, "list"),
                    }
                }
                Some(AstNode::List(node))
            }
            StmtKind::Choice => {
                let mut node = AstChoice {
                    common,
                    default_case: None,
                    mandatory: None,
                    cases: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(StmtKind::Default) => {
                            let value = self.arg(&sub);
                            self.set_once(&mut node.default_case, value, &sub);
                        }
                        Some(StmtKind::Mandatory) => node.mandatory = self.parse_bool(&sub),
                        Some(k) if k.is_data_def() => {
                            if let Some(child) = self.build_node(sub) {
                                node.cases.push(child);
                            }
                        }
                        _ => self.invalid_sub(&sub, "choice"),
                    }
                }
                Some(AstNode::Choice(node))
            }
            StmtKind::Case => {
                let mut node = AstCase {
                    common,
                    children: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(k) if k.is_data_def() => {
                            if let Some(child) = self.build_node(sub) {
                                node.children.push(child);
                            }
                        }
                        _ => self.invalid_sub(&sub, "case"),
                    }
                }
                Some(AstNode::Case(node))
            }
            StmtKind::Anydata | StmtKind::Anyxml => {
                let mut node = AstAny {
                    common,
                    mandatory: None,
                    musts: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(StmtKind::Mandatory) => node.mandatory = self.parse_bool(&sub),
                        Some(StmtKind::Must) => {
                            let must = self.build_must(sub);
                            node.musts.push(must);
                        }
                        _ => self.invalid_sub(&sub, &keyword),
                    }
                }
                Some(if kind == StmtKind::Anydata {
                    AstNode::Anydata(node)
                } else {
                    AstNode::Anyxml(node)
                })
            }
            StmtKind::Uses => {
                let mut node = AstUses {
                    common,
                    refines: Vec::new(),
                    augments: Vec::new(),
                };
                for sub in rest {
                    match sub.kind {
                        Some(StmtKind::Refine) => {
                            let refine = self.build_refine(sub);
                            node.refines.push(refine);
                        }
                        Some(StmtKind::Augment) => {
                            let augment = self.build_augment(sub);
                            node.augments.push(augment);
                        }
                        _ => self.invalid_sub(&sub, "uses"),
                    }
                }
                Some(AstNode::Uses(node))
            }
            _ => None,
        }
    }

    fn invalid_sub(&mut self, sub: &RawStmt, parent: &str) {
        self.error(
            sub.span,
            format!(
                "statement \"{}\" not allowed inside \"{parent}\"",
                sub.keyword
            ),
        );
    }

    fn build_refine(&mut self, stmt: RawStmt) -> AstRefine {
        let target = self.arg(&stmt);
        let mut refine = AstRefine {
            target,
            ..AstRefine::default()
        };
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::Description) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut refine.description, value, &sub);
                }
                Some(StmtKind::Config) => refine.config = self.parse_bool(&sub),
                Some(StmtKind::Mandatory) => refine.mandatory = self.parse_bool(&sub),
                Some(StmtKind::Presence) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut refine.presence, value, &sub);
                }
                Some(StmtKind::Default) => {
                    let value = self.arg(&sub);
                    refine.defaults.push(value);
                }
                Some(StmtKind::MinElements) => refine.min_elements = self.parse_u32(&sub),
                Some(StmtKind::MaxElements) => {
                    refine.max_elements = self.parse_max_elements(&sub);
                }
                Some(StmtKind::Must) => {
                    let must = self.build_must(sub);
                    refine.musts.push(must);
                }
                _ => {}
            }
        }
        refine
    }

    fn build_augment(&mut self, stmt: RawStmt) -> AstAugment {
        let target = self.arg(&stmt);
        let span = stmt.span;
        let mut augment = AstAugment {
            target,
            when: None,
            if_features: Vec::new(),
            status: AstStatus::Current,
            children: Vec::new(),
            actions: Vec::new(),
            notifications: Vec::new(),
            span,
        };
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::When) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut augment.when, value, &sub);
                }
                Some(StmtKind::IfFeature) => {
                    let value = self.arg(&sub);
                    augment.if_features.push(value);
                }
                Some(StmtKind::Status) => augment.status = self.parse_status(&sub),
                Some(StmtKind::Description | StmtKind::Reference) => {}
                Some(StmtKind::Action) => {
                    let action = self.build_rpc(sub);
                    augment.actions.push(action);
                }
                Some(StmtKind::Notification) => {
                    let notification = self.build_notification(sub);
                    augment.notifications.push(notification);
                }
                Some(k) if k.is_data_def() => {
                    if let Some(child) = self.build_node(sub) {
                        augment.children.push(child);
                    }
                }
                _ => self.invalid_sub(&sub, "augment"),
            }
        }
        augment
    }

    fn build_deviation(&mut self, stmt: RawStmt) -> AstDeviation {
        let target = self.arg(&stmt);
        let span = stmt.span;
        let mut deviation = AstDeviation {
            target,
            description: None,
            deviates: Vec::new(),
            span,
        };
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::Description) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut deviation.description, value, &sub);
                }
                Some(StmtKind::Deviate) => {
                    let deviate = self.build_deviate(sub);
                    deviation.deviates.push(deviate);
                }
                _ => self.invalid_sub(&sub, "deviation"),
            }
        }
        deviation
    }

    fn build_deviate(&mut self, stmt: RawStmt) -> AstDeviate {
        let which = self.arg(&stmt);
        let span = stmt.span;
        let mut props = AstDeviateProps::default();
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::Type) => {
                    let value = self.build_type(sub);
                    props.ty = Some(value);
                }
                Some(StmtKind::Units) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut props.units, value, &sub);
                }
                Some(StmtKind::Must) => {
                    let must = self.build_must(sub);
                    props.musts.push(must);
                }
                Some(StmtKind::Unique) => {
                    let value = self.arg(&sub);
                    props.uniques.push(value);
                }
                Some(StmtKind::Default) => {
                    let value = self.arg(&sub);
                    props.defaults.push(value);
                }
                Some(StmtKind::Config) => props.config = self.parse_bool(&sub),
                Some(StmtKind::Mandatory) => props.mandatory = self.parse_bool(&sub),
                Some(StmtKind::MinElements) => props.min_elements = self.parse_u32(&sub),
                Some(StmtKind::MaxElements) => {
                    props.max_elements = self.parse_max_elements(&sub);
                }
                _ => {}
            }
        }
        match which.as_str() {
            "not-supported" => AstDeviate::NotSupported,
            "add" => AstDeviate::Add(props),
            "replace" => AstDeviate::Replace(props),
            "delete" => AstDeviate::Delete(props),
            other => {
                self.error(span, format!("invalid \"deviate\" value \"{other}\""));
                AstDeviate::NotSupported
            }
        }
    }

    fn build_rpc(&mut self, stmt: RawStmt) -> AstRpc {
        let name = self.arg(&stmt);
        let span = stmt.span;
        let mut rpc = AstRpc {
            name,
            if_features: Vec::new(),
            status: AstStatus::Current,
            description: None,
            typedefs: Vec::new(),
            groupings: Vec::new(),
            input: None,
            output: None,
            span,
        };
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::IfFeature) => {
                    let value = self.arg(&sub);
                    rpc.if_features.push(value);
                }
                Some(StmtKind::Status) => rpc.status = self.parse_status(&sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut rpc.description, value, &sub);
                }
                Some(StmtKind::Reference) => {}
                Some(StmtKind::Typedef) => {
                    let typedef = self.build_typedef(sub);
                    rpc.typedefs.push(typedef);
                }
                Some(StmtKind::Grouping) => {
                    let grouping = self.build_grouping(sub);
                    rpc.groupings.push(grouping);
                }
                Some(StmtKind::Input) => {
                    let io = self.build_in_out(sub);
                    if rpc.input.is_some() {
                        self.error(span, "duplicate \"input\" statement");
                    } else {
                        rpc.input = Some(io);
                    }
                }
                Some(StmtKind::Output) => {
                    let io = self.build_in_out(sub);
                    if rpc.output.is_some() {
                        self.error(span, "duplicate \"output\" statement");
                    } else {
                        rpc.output = Some(io);
                    }
                }
                _ => {}
            }
        }
        rpc
    }

    fn build_in_out(&mut self, stmt: RawStmt) -> AstInOut {
        let mut io = AstInOut::default();
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::Must) => {
                    let must = self.build_must(sub);
                    io.musts.push(must);
                }
                Some(StmtKind::Typedef) => {
                    let typedef = self.build_typedef(sub);
                    io.typedefs.push(typedef);
                }
                Some(StmtKind::Grouping) => {
                    let grouping = self.build_grouping(sub);
                    io.groupings.push(grouping);
                }
                Some(k) if k.is_data_def() => {
                    if let Some(child) = self.build_node(sub) {
                        io.children.push(child);
                    }
                }
                _ => {}
            }
        }
        io
    }

    fn build_notification(&mut self, stmt: RawStmt) -> AstNotification {
        let name = self.arg(&stmt);
        let span = stmt.span;
        let mut notification = AstNotification {
            name,
            if_features: Vec::new(),
            status: AstStatus::Current,
            description: None,
            musts: Vec::new(),
            typedefs: Vec::new(),
            groupings: Vec::new(),
            children: Vec::new(),
            span,
        };
        for sub in stmt.children {
            match sub.kind {
                Some(StmtKind::IfFeature) => {
                    let value = self.arg(&sub);
                    notification.if_features.push(value);
                }
                Some(StmtKind::Status) => notification.status = self.parse_status(&sub),
                Some(StmtKind::Description) => {
                    let value = self.arg(&sub);
                    self.set_once(&mut notification.description, value, &sub);
                }
                Some(StmtKind::Must) => {
                    let must = self.build_must(sub);
                    notification.musts.push(must);
                }
                Some(StmtKind::Typedef) => {
                    let typedef = self.build_typedef(sub);
                    notification.typedefs.push(typedef);
                }
                Some(StmtKind::Grouping) => {
                    let grouping = self.build_grouping(sub);
                    notification.groupings.push(grouping);
                }
                Some(k) if k.is_data_def() => {
                    if let Some(child) = self.build_node(sub) {
                        notification.children.push(child);
                    }
                }
                _ => {}
            }
        }
        notification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> ParsedModule {
        let module = parse_module_text(source.as_bytes());
        let errors: Vec<_> = module
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        module
    }

    #[test]
    fn test_minimal_module() {
        let module = parse_ok(
            r#"module a {
                 namespace "urn:a";
                 prefix a;
               }"#,
        );
        assert_eq!(module.name, "a");
        assert_eq!(module.namespace.as_deref(), Some("urn:a"));
        assert_eq!(module.prefix.as_deref(), Some("a"));
        assert_eq!(module.yang_version, YangVersion::V1);
    }

    #[test]
    fn test_leaf_with_restricted_type() {
        let module = parse_ok(
            r#"module a {
                 namespace "urn:a";
                 prefix a;
                 leaf x { type int8 { range "0..10"; } default 3; }
               }"#,
        );
        assert_eq!(module.body.len(), 1);
        let AstNode::Leaf(leaf) = &module.body[0] else {
            panic!("expected a leaf");
        };
        assert_eq!(leaf.common.name, "x");
        assert_eq!(leaf.ty.name, "int8");
        assert_eq!(leaf.ty.range.as_deref(), Some("0..10"));
        assert_eq!(leaf.default.as_deref(), Some("3"));
    }

    #[test]
    fn test_section_order_enforced() {
        let module = parse_module_text(
            br#"module a {
                  prefix a;
                  namespace "urn:a";
                  import other { prefix o; }
                  yang-version 1.1;
                }"#,
        );
        // yang-version (header) after import (linkage) is out of order.
        assert!(module
            .diagnostics
            .iter()
            .any(|d| d.message.contains("out of order")));
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let module = parse_module_text(
            br#"module a {
                  namespace "urn:a";
                  prefix a;
                  bogus x;
                }"#,
        );
        assert!(module
            .diagnostics
            .iter()
            .any(|d| d.message.contains("invalid keyword \"bogus\"")));
    }

    #[test]
    fn test_prefixed_keyword_kept_as_extension() {
        let module = parse_ok(
            r#"module a {
                 namespace "urn:a";
                 prefix a;
                 ext:annotation "note";
               }"#,
        );
        assert_eq!(module.ext_instances.len(), 1);
        assert_eq!(module.ext_instances[0].prefix, "ext");
        assert_eq!(module.ext_instances[0].keyword, "annotation");
        assert_eq!(module.ext_instances[0].argument.as_deref(), Some("note"));
    }

    #[test]
    fn test_string_concatenation() {
        let module = parse_ok(
            r#"module a {
                 namespace "urn:a";
                 prefix a;
                 leaf x { type string { pattern "ab" + 'cd'; } }
               }"#,
        );
        let AstNode::Leaf(leaf) = &module.body[0] else {
            panic!("expected a leaf");
        };
        assert_eq!(leaf.ty.patterns[0].expr, "abcd");
    }

    #[test]
    fn test_union_member_order_preserved() {
        let module = parse_ok(
            r#"module a {
                 namespace "urn:a";
                 prefix a;
                 leaf x { type union { type int32; type string; } }
               }"#,
        );
        let AstNode::Leaf(leaf) = &module.body[0] else {
            panic!("expected a leaf");
        };
        assert_eq!(leaf.ty.union.len(), 2);
        assert_eq!(leaf.ty.union[0].name, "int32");
        assert_eq!(leaf.ty.union[1].name, "string");
    }

    #[test]
    fn test_list_with_keys_and_unique() {
        let module = parse_ok(
            r#"module a {
                 namespace "urn:a";
                 prefix a;
                 list l {
                   key "name";
                   unique "addr port";
                   leaf name { type string; }
                   leaf addr { type string; }
                   leaf port { type uint16; }
                 }
               }"#,
        );
        let AstNode::List(list) = &module.body[0] else {
            panic!("expected a list");
        };
        assert_eq!(list.key.as_deref(), Some("name"));
        assert_eq!(list.uniques, vec!["addr port".to_owned()]);
        assert_eq!(list.children.len(), 3);
    }

    #[test]
    fn test_duplicate_mandatory_child_rejected() {
        let module = parse_module_text(
            br#"module a {
                  namespace "urn:a";
                  namespace "urn:b";
                  prefix a;
                }"#,
        );
        assert!(module
            .diagnostics
            .iter()
            .any(|d| d.message.contains("duplicate \"namespace\"")));
    }

    #[test]
    fn test_submodule() {
        let module = parse_submodule_text(
            br#"submodule a-sub {
                  belongs-to a { prefix a; }
                  leaf extra { type string; }
                }"#,
        );
        assert!(module.is_submodule);
        assert_eq!(
            module.belongs_to,
            Some(("a".to_owned(), "a".to_owned()))
        );
        assert_eq!(module.body.len(), 1);
    }

    #[test]
    fn test_deviation_parsed() {
        let module = parse_ok(
            r#"module d {
                 namespace "urn:d";
                 prefix d;
                 import a { prefix a; }
                 deviation "/a:x" {
                   deviate replace { type string; }
                 }
                 deviation "/a:y" {
                   deviate not-supported;
                 }
               }"#,
        );
        assert_eq!(module.deviations.len(), 2);
        assert!(matches!(
            module.deviations[0].deviates[0],
            AstDeviate::Replace(_)
        ));
        assert!(matches!(
            module.deviations[1].deviates[0],
            AstDeviate::NotSupported
        ));
    }

    #[test]
    fn test_rpc_with_input_output() {
        let module = parse_ok(
            r#"module a {
                 namespace "urn:a";
                 prefix a;
                 rpc do-it {
                   input { leaf arg { type string; } }
                   output { leaf result { type string; } }
                 }
               }"#,
        );
        assert_eq!(module.rpcs.len(), 1);
        let rpc = &module.rpcs[0];
        assert_eq!(rpc.input.as_ref().unwrap().children.len(), 1);
        assert_eq!(rpc.output.as_ref().unwrap().children.len(), 1);
    }
}
