use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use swc_core::{
    common::{sync::Lrc, util::take::Take, SourceMapper, Span, Spanned, SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        atoms::Atom,
        utils::ExprFactory,
        visit::{VisitMut, VisitMutWith},
    },
    plugin::{
        metadata::TransformPluginMetadataContextKind, plugin_transform,
        proxies::TransformPluginProgramMetadata,
    },
};

// -----------------------------------------------------------------------------
// Globals
// -----------------------------------------------------------------------------

static REFRESH_RESET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@refresh\s+reset").unwrap());

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshConfig {
    /// Identifier of the component registration function.
    pub refresh_reg: Option<String>,
    /// Identifier of the signature tracker factory.
    pub refresh_sig: Option<String>,
    /// Emit raw signature text instead of passing it through the hasher.
    pub emit_full_signatures: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("`{0}` is not usable as a refresh runtime identifier")]
    Config(String),
}

/// Reduces a signature to a short stable string. Returning `None` keeps the
/// raw signature text.
pub type SignatureHasher = Box<dyn Fn(&str) -> Option<String>>;

/// SHA-1 + base64, the encoding the refresh runtime sees by default.
pub fn default_signature_hasher() -> SignatureHasher {
    Box::new(|signature| {
        let mut hasher = Sha1::new();
        hasher.update(signature.as_bytes());
        Some(STANDARD.encode(hasher.finalize()))
    })
}

fn is_valid_runtime_ident(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

// -----------------------------------------------------------------------------
// Classification
// -----------------------------------------------------------------------------

fn starts_with_lowercase(text: &str) -> bool {
    match text.chars().next() {
        Some(first) => !first.is_uppercase(),
        None => true,
    }
}

// <my-element>, <svg:path>, <div>; anything else is component-shaped
fn is_intrinsic_tag(text: &str) -> bool {
    text.contains('-') || text.contains(':') || starts_with_lowercase(text)
}

fn is_builtin_hook(name: &str) -> bool {
    matches!(
        name,
        "useState"
            | "useReducer"
            | "useEffect"
            | "useLayoutEffect"
            | "useMemo"
            | "useCallback"
            | "useRef"
            | "useContext"
            | "useImperativeHandle"
            | "useDebugValue"
            | "useId"
            | "useDeferredValue"
            | "useTransition"
            | "useInsertionEffect"
            | "useSyncExternalStore"
            | "useFormState"
            | "useActionState"
            | "useOptimistic"
    )
}

fn is_function_like_expr(expr: &Expr) -> bool {
    matches!(expr, Expr::Fn(_) | Expr::Arrow(_))
}

/// `useXxx(...)` or `obj.useXxx(...)`.
fn is_hook_call_shape(call: &CallExpr) -> bool {
    let Callee::Expr(callee) = &call.callee else {
        return false;
    };
    match &**callee {
        Expr::Ident(id) => id.sym.starts_with("use"),
        Expr::Member(member) => {
            matches!(&member.prop, MemberProp::Ident(prop) if prop.sym.starts_with("use"))
        }
        _ => false,
    }
}

/// `createElement(...)`, `jsx(...)`, `jsxs(...)`, `jsxDEV(...)`, directly or
/// behind a property access.
fn is_jsx_constructing_call(call: &CallExpr) -> bool {
    let Callee::Expr(callee) = &call.callee else {
        return false;
    };
    let name = match &**callee {
        Expr::Ident(id) => id.sym.as_ref(),
        Expr::Member(member) => match &member.prop {
            MemberProp::Ident(prop) => prop.sym.as_ref(),
            _ => return false,
        },
        _ => return false,
    };
    matches!(name, "createElement" | "jsx" | "jsxs" | "jsxDEV")
}

// Any identifier callee containing "require" counts, so `requireAuth(...)` is
// also treated as an import.
fn is_import_or_require_like(expr: &Expr) -> bool {
    let Expr::Call(call) = expr else {
        return false;
    };
    match &call.callee {
        Callee::Import(_) => true,
        Callee::Expr(callee) => {
            matches!(&**callee, Expr::Ident(id) if id.sym.contains("require"))
        }
        Callee::Super(_) => false,
    }
}

/// Initializers that must not be registered even when the binding is used as
/// a JSX tag: aliases (`const A = B`, `const A = B.X`), imports, and
/// conditionals built from those.
fn is_unwanted_component_definition(expr: &Expr) -> bool {
    if is_import_or_require_like(expr) {
        return true;
    }
    match expr {
        Expr::Ident(_) | Expr::Member(_) => true,
        Expr::Cond(cond) => {
            is_unwanted_component_definition(&cond.test)
                || is_unwanted_component_definition(&cond.cons)
                || is_unwanted_component_definition(&cond.alt)
        }
        _ => false,
    }
}

/// `wrap(Component)`, `wrap(moreWrap(() => ...))` and similar chains where
/// unwrapping first arguments eventually reaches a function or a capitalized
/// identifier.
fn is_higher_order_component_like(expr: &Expr) -> bool {
    if !matches!(expr, Expr::Call(_)) {
        return false;
    }
    let mut current = expr;
    loop {
        let Expr::Call(call) = current else {
            break;
        };
        if is_import_or_require_like(current) {
            break;
        }
        let valid_callee = match &call.callee {
            Callee::Expr(callee) => match &**callee {
                Expr::Ident(_) => true,
                Expr::Member(member) => matches!(member.prop, MemberProp::Ident(_)),
                _ => false,
            },
            _ => false,
        };
        if !valid_callee {
            return false;
        }
        match call.args.first() {
            Some(arg) if arg.spread.is_none() => current = &arg.expr,
            _ => return false,
        }
    }
    is_function_like_expr(current)
        || matches!(current, Expr::Ident(id) if !starts_with_lowercase(&id.sym))
}

// -----------------------------------------------------------------------------
// Scope collection
// -----------------------------------------------------------------------------

fn add_component_candidate_names(decl: &Decl, names: &mut HashSet<Atom>) {
    match decl {
        Decl::Fn(func) => {
            names.insert(func.ident.sym.clone());
        }
        Decl::Var(var) => {
            for declarator in &var.decls {
                // destructuring patterns are skipped
                if let Some(binding) = declarator.name.as_ident() {
                    names.insert(binding.id.sym.clone());
                }
            }
        }
        _ => {}
    }
}

/// Names bound by top-level statements, the candidate set for component and
/// JSX-usage tracking. Imports are not candidates.
fn collect_top_level_names(items: &[ModuleItem]) -> HashSet<Atom> {
    let mut names = HashSet::new();
    for item in items {
        match item {
            ModuleItem::Stmt(Stmt::Decl(decl)) => add_component_candidate_names(decl, &mut names),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                add_component_candidate_names(&export.decl, &mut names)
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                if let DefaultDecl::Fn(expr) = &export.decl {
                    if let Some(name) = &expr.ident {
                        names.insert(name.sym.clone());
                    }
                }
            }
            _ => {}
        }
    }
    names
}

fn add_resolvable_decl_names(decl: &Decl, names: &mut HashSet<Atom>) {
    match decl {
        Decl::Var(var) => {
            for declarator in &var.decls {
                if let Some(binding) = declarator.name.as_ident() {
                    names.insert(binding.id.sym.clone());
                }
            }
        }
        Decl::Fn(func) if func.function.body.is_some() => {
            names.insert(func.ident.sym.clone());
        }
        _ => {}
    }
}

/// Names a block scope can resolve a custom hook against: variable statements
/// and bodied function declarations.
fn declared_scope_names(stmts: &[Stmt]) -> HashSet<Atom> {
    let mut names = HashSet::new();
    for stmt in stmts {
        if let Stmt::Decl(decl) = stmt {
            add_resolvable_decl_names(decl, &mut names);
        }
    }
    names
}

fn add_import_names(import: &ImportDecl, names: &mut HashSet<Atom>) {
    for specifier in &import.specifiers {
        match specifier {
            ImportSpecifier::Named(named) => {
                names.insert(named.local.sym.clone());
            }
            ImportSpecifier::Default(default) => {
                names.insert(default.local.sym.clone());
            }
            ImportSpecifier::Namespace(namespace) => {
                names.insert(namespace.local.sym.clone());
            }
        }
    }
}

/// The module scope additionally resolves import bindings.
fn declared_module_scope_names(items: &[ModuleItem]) -> HashSet<Atom> {
    let mut names = HashSet::new();
    for item in items {
        match item {
            ModuleItem::Stmt(Stmt::Decl(decl)) => add_resolvable_decl_names(decl, &mut names),
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                add_import_names(import, &mut names)
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                add_resolvable_decl_names(&export.decl, &mut names)
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                if let DefaultDecl::Fn(expr) = &export.decl {
                    if expr.function.body.is_some() {
                        if let Some(name) = &expr.ident {
                            names.insert(name.sym.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names
}

// -----------------------------------------------------------------------------
// Per-pass bookkeeping
// -----------------------------------------------------------------------------

// Original nodes are keyed by their source span; synthesized nodes never need
// a key.
type NodeKey = (u32, u32);

fn node_key(span: Span) -> NodeKey {
    (span.lo.0, span.hi.0)
}

#[derive(Default)]
struct TempNames {
    next: u32,
}

impl TempNames {
    fn fresh(&mut self) -> Ident {
        self.next += 1;
        Ident::new(
            format!("_react_refresh_temp_{}", self.next).into(),
            DUMMY_SP,
            SyntaxContext::empty(),
        )
    }
}

/// Pending hoists for one lexical environment (a function body or the file):
/// `var` bindings plus tracker initialization statements, flushed to the top
/// of the owning body when the environment closes.
#[derive(Default)]
struct EnvFrame {
    hoisted: Vec<Ident>,
    inits: Vec<Stmt>,
}

impl EnvFrame {
    fn is_empty(&self) -> bool {
        self.hoisted.is_empty() && self.inits.is_empty()
    }
}

struct FnFrame {
    key: NodeKey,
    scope_depth: usize,
}

struct HookCallSite {
    call: CallExpr,
    assign_target: String,
    force: bool,
    external: Option<Expr>,
}

fn env_prologue(frame: EnvFrame) -> Vec<Stmt> {
    let EnvFrame { hoisted, inits } = frame;
    let mut prologue = Vec::with_capacity(inits.len() + 1);
    if !hoisted.is_empty() {
        prologue.push(Stmt::Decl(Decl::Var(Box::new(VarDecl {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            kind: VarDeclKind::Var,
            declare: false,
            decls: hoisted
                .into_iter()
                .map(|id| VarDeclarator {
                    span: DUMMY_SP,
                    name: Pat::Ident(BindingIdent { id, type_ann: None }),
                    init: None,
                    definite: false,
                })
                .collect(),
        }))));
    }
    prologue.extend(inits);
    prologue
}

fn flush_env_into_block(frame: EnvFrame, body: &mut BlockStmt) {
    if frame.is_empty() {
        return;
    }
    body.stmts.splice(0..0, env_prologue(frame));
}

fn flush_env_into_arrow(frame: EnvFrame, arrow: &mut ArrowExpr) {
    if frame.is_empty() {
        return;
    }
    let body = std::mem::replace(
        &mut *arrow.body,
        BlockStmtOrExpr::Expr(Box::new(Expr::Invalid(Invalid { span: DUMMY_SP }))),
    );
    match body {
        BlockStmtOrExpr::BlockStmt(mut block) => {
            block.stmts.splice(0..0, env_prologue(frame));
            *arrow.body = BlockStmtOrExpr::BlockStmt(block);
        }
        // A concise body grows a real block so the hoists have a place to live.
        BlockStmtOrExpr::Expr(expr) => {
            let mut stmts = env_prologue(frame);
            stmts.push(Stmt::Return(ReturnStmt {
                span: DUMMY_SP,
                arg: Some(expr),
            }));
            *arrow.body = BlockStmtOrExpr::BlockStmt(BlockStmt {
                span: DUMMY_SP,
                ctxt: SyntaxContext::empty(),
                stmts,
            });
        }
    }
}

// -----------------------------------------------------------------------------
// AST builders
// -----------------------------------------------------------------------------

fn assign_to(temp: Ident, value: Expr) -> Expr {
    Expr::Assign(AssignExpr {
        span: DUMMY_SP,
        op: AssignOp::Assign,
        left: AssignTarget::Simple(SimpleAssignTarget::Ident(BindingIdent {
            id: temp,
            type_ann: None,
        })),
        right: Box::new(value),
    })
}

fn tracker_call(tracker: &Ident) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Expr::Ident(tracker.clone()).as_callee(),
        args: vec![],
        type_args: None,
    })
}

fn tracker_invocation(tracker: &Ident) -> Stmt {
    tracker_call(tracker).into_stmt()
}

fn prepend_tracker_to_arrow(arrow: &mut ArrowExpr, tracker: &Ident) {
    match &mut *arrow.body {
        BlockStmtOrExpr::BlockStmt(block) => {
            block.stmts.insert(0, tracker_invocation(tracker));
        }
        BlockStmtOrExpr::Expr(expr) => {
            let value = (**expr).take();
            **expr = Expr::Seq(SeqExpr {
                span: DUMMY_SP,
                exprs: vec![Box::new(tracker_call(tracker)), Box::new(value)],
            });
        }
    }
}

fn signature_literal(signature: &str) -> Expr {
    if signature.contains('\n') {
        let raw = signature
            .replace('\\', "\\\\")
            .replace('`', "\\`")
            .replace("${", "\\${");
        Expr::Tpl(Tpl {
            span: DUMMY_SP,
            exprs: vec![],
            quasis: vec![TplElement {
                span: DUMMY_SP,
                tail: true,
                cooked: Some(signature.into()),
                raw: raw.into(),
            }],
        })
    } else {
        Expr::Lit(Lit::Str(Str {
            span: DUMMY_SP,
            value: signature.into(),
            raw: None,
        }))
    }
}

fn external_hooks_getter(hooks: Vec<Expr>) -> Expr {
    Expr::Arrow(ArrowExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        params: vec![],
        is_async: false,
        is_generator: false,
        type_params: None,
        return_type: None,
        body: Box::new(BlockStmtOrExpr::Expr(Box::new(Expr::Array(ArrayLit {
            span: DUMMY_SP,
            elems: hooks.into_iter().map(|hook| Some(hook.as_arg())).collect(),
        })))),
    })
}

fn function_like_key(expr: &Expr) -> Option<NodeKey> {
    match expr {
        Expr::Fn(func) => Some(node_key(func.function.span)),
        Expr::Arrow(arrow) => Some(node_key(arrow.span)),
        _ => None,
    }
}

/// One-shot adoption of a just-discovered declared name into an already-built
/// tracker call, so `const Comp = () => <Comp/>` resolves its own binding.
fn adopt_declared_name(register: &mut CallExpr, name: &Ident) {
    let mut replaced = false;
    for arg in register.args.iter_mut() {
        if replaced {
            break;
        }
        if is_function_like_expr(&arg.expr) {
            arg.expr = Box::new(Expr::Ident(name.clone()));
            replaced = true;
        }
    }
}

fn unreachable_hoc_shape() -> ! {
    panic!(
        "react-refresh transform internal error: tried to rewrite a call that was not \
         classified as a higher-order component; please report this bug"
    )
}

// -----------------------------------------------------------------------------
// Transform state
// -----------------------------------------------------------------------------

pub struct RefreshTransform {
    refresh_reg: Atom,
    refresh_sig: Atom,
    emit_full_signatures: bool,
    hash_signature: Option<SignatureHasher>,
    source_map: Option<Lrc<dyn SourceMapper>>,

    // -------- state of one pass over one file --------
    force_reset: bool,
    temp_names: TempNames,
    top_level_names: HashSet<Atom>,
    used_as_jsx: HashSet<Atom>,
    pending_assign_targets: HashMap<NodeKey, String>,
    hooks_by_fn: HashMap<NodeKey, Vec<HookCallSite>>,
    fn_decl_signatures: HashMap<NodeKey, CallExpr>,
    fn_signature_exprs: HashMap<NodeKey, CallExpr>,
    scope_stack: Vec<HashSet<Atom>>,
    fn_stack: Vec<FnFrame>,
    env_stack: Vec<EnvFrame>,
}

impl RefreshTransform {
    pub fn new(
        config: RefreshConfig,
        source_map: Option<Lrc<dyn SourceMapper>>,
        hash_signature: Option<SignatureHasher>,
    ) -> Result<Self, RefreshError> {
        let refresh_reg = config
            .refresh_reg
            .unwrap_or_else(|| "$RefreshReg$".to_string());
        let refresh_sig = config
            .refresh_sig
            .unwrap_or_else(|| "$RefreshSig$".to_string());
        for name in [&refresh_reg, &refresh_sig] {
            if !is_valid_runtime_ident(name) {
                return Err(RefreshError::Config(name.clone()));
            }
        }
        Ok(Self {
            refresh_reg: refresh_reg.into(),
            refresh_sig: refresh_sig.into(),
            emit_full_signatures: config.emit_full_signatures,
            hash_signature,
            source_map,
            force_reset: false,
            temp_names: TempNames::default(),
            top_level_names: HashSet::new(),
            used_as_jsx: HashSet::new(),
            pending_assign_targets: HashMap::new(),
            hooks_by_fn: HashMap::new(),
            fn_decl_signatures: HashMap::new(),
            fn_signature_exprs: HashMap::new(),
            scope_stack: Vec::new(),
            fn_stack: Vec::new(),
            env_stack: Vec::new(),
        })
    }

    /// Rewrite one program. `source_text` drives the fast exit and the
    /// `@refresh reset` opt-out; when it cannot be recovered the transform
    /// runs conservatively. `jsx_source` marks files whose extension implies
    /// JSX even when the text contains no hook-like identifier.
    pub fn process(&mut self, program: &mut Program, source_text: Option<&str>, jsx_source: bool) {
        self.reset_pass_state();
        let worth_scanning = jsx_source || source_text.map_or(true, |text| text.contains("use"));
        if !worth_scanning {
            return;
        }
        self.force_reset = source_text.map_or(false, |text| REFRESH_RESET_MARKER.is_match(text));
        match program {
            Program::Module(module) => self.process_module(module),
            Program::Script(script) => self.process_script(script),
        }
    }

    fn reset_pass_state(&mut self) {
        self.force_reset = false;
        self.temp_names = TempNames::default();
        self.top_level_names.clear();
        self.used_as_jsx.clear();
        self.pending_assign_targets.clear();
        self.hooks_by_fn.clear();
        self.fn_decl_signatures.clear();
        self.fn_signature_exprs.clear();
        self.scope_stack.clear();
        self.fn_stack.clear();
        self.env_stack.clear();
    }

    fn process_module(&mut self, module: &mut Module) {
        self.top_level_names = collect_top_level_names(&module.body);

        // Deep pass: JSX usage, hook tracking, tracker injection.
        self.scope_stack
            .push(declared_module_scope_names(&module.body));
        self.env_stack.push(EnvFrame::default());
        self.visit_mut_module_items(&mut module.body);
        self.scope_stack.pop();
        let deep_env = self.env_stack.pop().unwrap_or_default();

        // Top-level pass: component registration and HOC rewriting.
        self.env_stack.push(EnvFrame::default());
        self.rewrite_top_level(&mut module.body);
        let top_env = self.env_stack.pop().unwrap_or_default();

        prepend_env_to_module(module, deep_env);
        prepend_env_to_module(module, top_env);
    }

    // Scripts ride through the module machinery; nothing the rewrite emits is
    // module-specific.
    fn process_script(&mut self, script: &mut Script) {
        let body = std::mem::take(&mut script.body);
        let mut module = Module {
            span: script.span,
            body: body.into_iter().map(ModuleItem::Stmt).collect(),
            shebang: script.shebang.take(),
        };
        self.process_module(&mut module);
        script.shebang = module.shebang.take();
        script.body = module
            .body
            .into_iter()
            .filter_map(|item| match item {
                ModuleItem::Stmt(stmt) => Some(stmt),
                ModuleItem::ModuleDecl(_) => None,
            })
            .collect();
    }

    // ---------- temporaries & trackers ----------

    fn fresh_temp(&mut self) -> Ident {
        let temp = self.temp_names.fresh();
        if let Some(frame) = self.env_stack.last_mut() {
            frame.hoisted.push(temp.clone());
        }
        temp
    }

    fn sig_ident(&self) -> Ident {
        Ident::new(self.refresh_sig.clone(), DUMMY_SP, SyntaxContext::empty())
    }

    fn reg_ident(&self) -> Ident {
        Ident::new(self.refresh_reg.clone(), DUMMY_SP, SyntaxContext::empty())
    }

    fn alloc_tracker(&mut self) -> Ident {
        let tracker = self.fresh_temp();
        let init = assign_to(
            tracker.clone(),
            Expr::Call(CallExpr {
                span: DUMMY_SP,
                ctxt: SyntaxContext::empty(),
                callee: Expr::Ident(self.sig_ident()).as_callee(),
                args: vec![],
                type_args: None,
            }),
        );
        if let Some(frame) = self.env_stack.last_mut() {
            frame.inits.push(init.into_stmt());
        }
        tracker
    }

    // ---------- source text ----------

    fn snippet(&self, span: Span) -> Option<String> {
        if span.is_dummy() {
            return None;
        }
        let cm = self.source_map.as_ref()?;
        cm.span_to_snippet(span).ok()
    }

    fn expr_text(&self, expr: &Expr) -> String {
        if let Some(text) = self.snippet(expr.span()) {
            return text;
        }
        match expr {
            Expr::Ident(id) => id.sym.to_string(),
            Expr::Member(member) => match &member.prop {
                MemberProp::Ident(prop) => {
                    let object = self.expr_text(&member.obj);
                    if object.is_empty() {
                        String::new()
                    } else {
                        format!("{}.{}", object, prop.sym)
                    }
                }
                _ => String::new(),
            },
            _ => String::new(),
        }
    }

    fn pat_text(&self, pat: &Pat) -> String {
        if let Some(text) = self.snippet(pat.span()) {
            return text;
        }
        match pat {
            Pat::Ident(binding) => binding.id.sym.to_string(),
            _ => String::new(),
        }
    }

    // ---------- signatures ----------

    fn hook_descriptor(&self, site: &HookCallSite) -> String {
        let callee = match &site.call.callee {
            Callee::Expr(callee) => &**callee,
            _ => return String::new(),
        };
        let mut hook_name = self.expr_text(callee);
        if let Expr::Member(member) = callee {
            if let (Expr::Ident(object), MemberProp::Ident(prop)) = (&*member.obj, &member.prop) {
                if object.sym.as_ref() == "React" {
                    hook_name = prop.sym.to_string();
                }
            }
        }
        // bit-wise parameter position: useState keeps its initial value,
        // useReducer its initial state
        let capture_mask: u32 = match hook_name.as_str() {
            "useState" => 1 << 0,
            "useReducer" => 1 << 1,
            _ => 0,
        };
        let mut captured = String::new();
        for (index, arg) in site.call.args.iter().enumerate() {
            if index >= 32 {
                break;
            }
            if (1u32 << index) & capture_mask != 0 {
                if !captured.is_empty() {
                    captured.push(',');
                }
                captured.push_str(&self.expr_text(&arg.expr));
            }
        }
        if captured.is_empty() {
            format!("{}{{{}}}", hook_name, site.assign_target)
        } else {
            format!("{}{{{}({})}}", hook_name, site.assign_target, captured)
        }
    }

    fn hooks_signature(&self, sites: &[HookCallSite]) -> String {
        let signature = sites
            .iter()
            .map(|site| self.hook_descriptor(site))
            .collect::<Vec<_>>()
            .join("\n");
        if !self.emit_full_signatures {
            if let Some(hash) = &self.hash_signature {
                if let Some(hashed) = hash(&signature) {
                    return hashed;
                }
            }
        }
        signature
    }

    fn build_register_call(
        &self,
        tracker: &Ident,
        component: Expr,
        sites: &[HookCallSite],
    ) -> CallExpr {
        let signature = self.hooks_signature(sites);
        let force = self.force_reset || sites.iter().any(|site| site.force);
        let externals: Vec<Expr> = sites
            .iter()
            .filter_map(|site| site.external.clone())
            .collect();
        let mut args = vec![component.as_arg(), signature_literal(&signature).as_arg()];
        if force || !externals.is_empty() {
            args.push(
                Expr::Lit(Lit::Bool(Bool {
                    span: DUMMY_SP,
                    value: force,
                }))
                .as_arg(),
            );
        }
        if !externals.is_empty() {
            args.push(external_hooks_getter(externals).as_arg());
        }
        CallExpr {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            callee: Expr::Ident(tracker.clone()).as_callee(),
            args,
            type_args: None,
        }
    }

    // ---------- hook resolution ----------

    fn has_declaration_in_scope(&self, name: &Atom, cutoff: usize) -> bool {
        self.scope_stack
            .iter()
            .take(cutoff)
            .any(|scope| scope.contains(name))
    }

    /// Whether one hook call forces a full remount, and the callee to keep
    /// watching when it resolves to a custom hook in an enclosing scope.
    fn classify_hook_callee(&self, call: &CallExpr, scope_cutoff: usize) -> (bool, Option<Expr>) {
        let callee = match &call.callee {
            Callee::Expr(callee) => &**callee,
            _ => return (true, None),
        };
        match callee {
            Expr::Member(member) => match (&*member.obj, &member.prop) {
                (Expr::Ident(object), MemberProp::Ident(_)) => {
                    if object.sym.as_ref() == "React" {
                        (false, None)
                    } else if self.has_declaration_in_scope(&object.sym, scope_cutoff) {
                        (false, Some(callee.clone()))
                    } else {
                        (true, None)
                    }
                }
                _ => (true, None),
            },
            Expr::Ident(id) => {
                if is_builtin_hook(&id.sym) {
                    (false, None)
                } else if self.has_declaration_in_scope(&id.sym, scope_cutoff) {
                    (false, Some(callee.clone()))
                } else {
                    (true, None)
                }
            }
            _ => (true, None),
        }
    }

    // ---------- deep-pass detection ----------

    fn note_jsx_constructing_call(&mut self, call: &CallExpr) {
        if !is_jsx_constructing_call(call) {
            return;
        }
        let Some(first) = call.args.first() else {
            return;
        };
        if first.spread.is_some() {
            return;
        }
        if let Expr::Ident(id) = &*first.expr {
            if self.top_level_names.contains(&id.sym) {
                self.used_as_jsx.insert(id.sym.clone());
            }
        }
    }

    fn note_hook_call(&mut self, call: &CallExpr) {
        if !is_hook_call_shape(call) {
            return;
        }
        // A call outside every function is file-level; there is no component
        // to sign, so nothing is tracked for it.
        let (owner_key, owner_scope_depth) = match self.fn_stack.last() {
            Some(frame) => (frame.key, frame.scope_depth),
            None => return,
        };
        let assign_target = self
            .pending_assign_targets
            .remove(&node_key(call.span))
            .unwrap_or_default();
        let (force, external) = self.classify_hook_callee(call, owner_scope_depth);
        self.hooks_by_fn
            .entry(owner_key)
            .or_default()
            .push(HookCallSite {
                call: call.clone(),
                assign_target,
                force,
                external,
            });
    }

    // ---------- top-level rewriting ----------

    fn component_register_stmt(&self, id: &Ident, name: &str) -> Stmt {
        Expr::Call(CallExpr {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            callee: Expr::Ident(self.reg_ident()).as_callee(),
            args: vec![
                Expr::Ident(id.clone()).as_arg(),
                Expr::Lit(Lit::Str(Str {
                    span: DUMMY_SP,
                    value: name.into(),
                    raw: None,
                }))
                .as_arg(),
            ],
            type_args: None,
        })
        .into_stmt()
    }

    fn register_component(&mut self, name: &Ident) -> Vec<Stmt> {
        if starts_with_lowercase(name.sym.as_ref()) {
            return Vec::new();
        }
        let temp = self.fresh_temp();
        vec![
            assign_to(temp.clone(), Expr::Ident(name.clone())).into_stmt(),
            self.component_register_stmt(&temp, name.sym.as_ref()),
        ]
    }

    fn register_function_declaration(&mut self, decl: &FnDecl) -> Vec<Stmt> {
        if decl.function.body.is_none() {
            return Vec::new();
        }
        let name = decl.ident.clone();
        self.register_component(&name)
    }

    fn rewrite_top_level(&mut self, items: &mut Vec<ModuleItem>) {
        let mut next: Vec<ModuleItem> = Vec::with_capacity(items.len());
        for mut item in items.drain(..) {
            let trailing = match &mut item {
                ModuleItem::Stmt(Stmt::Decl(Decl::Fn(decl))) => {
                    self.register_function_declaration(decl)
                }
                ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => {
                    self.rewrite_variable_declarations(var)
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => match &mut export.decl {
                    Decl::Fn(decl) => self.register_function_declaration(decl),
                    Decl::Var(var) => self.rewrite_variable_declarations(var),
                    _ => Vec::new(),
                },
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                    if let DefaultDecl::Fn(expr) = &export.decl {
                        match (&expr.ident, &expr.function.body) {
                            (Some(name), Some(_)) => {
                                let name = name.clone();
                                self.register_component(&name)
                            }
                            _ => Vec::new(),
                        }
                    } else {
                        Vec::new()
                    }
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => {
                    self.rewrite_default_export(export)
                }
                _ => Vec::new(),
            };
            next.push(item);
            next.extend(trailing.into_iter().map(ModuleItem::Stmt));
        }
        *items = next;
    }

    fn rewrite_variable_declarations(&mut self, var: &mut VarDecl) -> Vec<Stmt> {
        let mut trailing = Vec::new();
        for declarator in &mut var.decls {
            // Not handling complex declarations, e.g. [A, B] = [() => ..., () => ...]
            let name = match declarator.name.as_ident() {
                Some(binding) => binding.id.clone(),
                None => continue,
            };
            let Some(init) = &mut declarator.init else {
                continue;
            };
            let used_as_jsx = self.used_as_jsx.contains(&name.sym);
            if used_as_jsx || is_function_like_expr(init) {
                if !is_unwanted_component_definition(init) {
                    trailing.extend(self.register_component(&name));
                }
                if let Some(key) = function_like_key(init) {
                    if let Some(mut register) = self.fn_signature_exprs.remove(&key) {
                        adopt_declared_name(&mut register, &name);
                        trailing.push(Expr::Call(register).into_stmt());
                    }
                }
                continue;
            }
            if is_higher_order_component_like(init) {
                let Expr::Call(call) = (**init).take() else {
                    continue;
                };
                let hint = name.sym.to_string();
                let (call, registers) = self.register_higher_order_component(call, &hint);
                **init = Expr::Call(call);
                trailing.extend(registers);
                trailing.extend(self.register_component(&name));
            }
        }
        trailing
    }

    fn rewrite_default_export(&mut self, export: &mut ExportDefaultExpr) -> Vec<Stmt> {
        if is_higher_order_component_like(&export.expr) {
            let Expr::Call(call) = (*export.expr).take() else {
                return Vec::new();
            };
            let (call, registers) = self.register_higher_order_component(call, "%default%");
            let temp = self.fresh_temp();
            *export.expr = assign_to(temp.clone(), Expr::Call(call));
            let mut trailing = vec![self.component_register_stmt(&temp, "%default%")];
            trailing.extend(registers);
            return trailing;
        }
        if let Some(key) = function_like_key(&export.expr) {
            if let Some(register) = self.fn_signature_exprs.remove(&key) {
                *export.expr = Expr::Call(register);
            }
        }
        Vec::new()
    }

    /// Only call this on calls that passed `is_higher_order_component_like`.
    fn register_higher_order_component(
        &mut self,
        mut call: CallExpr,
        name_hint: &str,
    ) -> (CallExpr, Vec<Stmt>) {
        let callee_text = match &call.callee {
            Callee::Expr(callee) => self.expr_text(callee),
            _ => String::new(),
        };
        let Some(first) = call.args.first_mut() else {
            unreachable_hoc_shape();
        };

        // Recursive case: x(y(...)) unwraps y(...) first.
        if matches!(&*first.expr, Expr::Call(_)) {
            let temp = self.fresh_temp();
            let next_hint = format!("{}${}", name_hint, callee_text);
            let Expr::Call(inner) = (*first.expr).take() else {
                unreachable_hoc_shape();
            };
            let (inner_call, mut registers) =
                self.register_higher_order_component(inner, &next_hint);
            first.expr = Box::new(assign_to(temp.clone(), Expr::Call(inner_call)));
            registers.push(self.component_register_stmt(&temp, &next_hint));
            return (call, registers);
        }

        // Base case: x(Identifier) needs no extra registration.
        if matches!(&*first.expr, Expr::Ident(_)) {
            return (call, Vec::new());
        }

        // Base case: x(function () {...}) or x(() => ...).
        if is_function_like_expr(&first.expr) {
            let temp = self.fresh_temp();
            let key = function_like_key(&first.expr);
            let func = (*first.expr).take();
            let value = key
                .and_then(|key| self.fn_signature_exprs.remove(&key))
                .map(Expr::Call)
                .unwrap_or(func);
            first.expr = Box::new(assign_to(temp.clone(), value));
            let register =
                self.component_register_stmt(&temp, &format!("{}${}", name_hint, callee_text));
            return (call, vec![register]);
        }

        unreachable_hoc_shape()
    }
}

fn prepend_env_to_module(module: &mut Module, frame: EnvFrame) {
    if frame.is_empty() {
        return;
    }
    let prologue: Vec<ModuleItem> = env_prologue(frame)
        .into_iter()
        .map(ModuleItem::Stmt)
        .collect();
    module.body.splice(0..0, prologue);
}

// -----------------------------------------------------------------------------
// Deep pass
// -----------------------------------------------------------------------------

impl VisitMut for RefreshTransform {
    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        items.visit_mut_children_with(self);
        if self.fn_decl_signatures.is_empty() {
            return;
        }
        let mut next = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            let signature = match &item {
                ModuleItem::Stmt(Stmt::Decl(Decl::Fn(decl))) => self
                    .fn_decl_signatures
                    .remove(&node_key(decl.function.span)),
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => match &export.decl {
                    Decl::Fn(decl) => self
                        .fn_decl_signatures
                        .remove(&node_key(decl.function.span)),
                    _ => None,
                },
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                    match &export.decl {
                        DefaultDecl::Fn(expr) => self
                            .fn_decl_signatures
                            .remove(&node_key(expr.function.span)),
                        _ => None,
                    }
                }
                _ => None,
            };
            next.push(item);
            if let Some(call) = signature {
                next.push(ModuleItem::Stmt(Expr::Call(call).into_stmt()));
            }
        }
        *items = next;
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.visit_mut_children_with(self);
        if self.fn_decl_signatures.is_empty() {
            return;
        }
        let mut next = Vec::with_capacity(stmts.len());
        for stmt in stmts.drain(..) {
            let signature = match &stmt {
                Stmt::Decl(Decl::Fn(decl)) => self
                    .fn_decl_signatures
                    .remove(&node_key(decl.function.span)),
                _ => None,
            };
            next.push(stmt);
            if let Some(call) = signature {
                next.push(Expr::Call(call).into_stmt());
            }
        }
        *stmts = next;
    }

    fn visit_mut_block_stmt(&mut self, block: &mut BlockStmt) {
        self.scope_stack.push(declared_scope_names(&block.stmts));
        block.visit_mut_children_with(self);
        self.scope_stack.pop();
    }

    fn visit_mut_function(&mut self, function: &mut Function) {
        self.env_stack.push(EnvFrame::default());
        function.visit_mut_children_with(self);
        let frame = self.env_stack.pop().unwrap_or_default();
        if let Some(body) = &mut function.body {
            flush_env_into_block(frame, body);
        }
    }

    fn visit_mut_constructor(&mut self, ctor: &mut Constructor) {
        self.env_stack.push(EnvFrame::default());
        ctor.visit_mut_children_with(self);
        let frame = self.env_stack.pop().unwrap_or_default();
        if let Some(body) = &mut ctor.body {
            flush_env_into_block(frame, body);
        }
    }

    fn visit_mut_fn_decl(&mut self, decl: &mut FnDecl) {
        let key = node_key(decl.function.span);
        self.fn_stack.push(FnFrame {
            key,
            scope_depth: self.scope_stack.len(),
        });
        decl.visit_mut_children_with(self);
        self.fn_stack.pop();

        let Some(sites) = self.hooks_by_fn.remove(&key) else {
            return;
        };
        let Some(body) = &mut decl.function.body else {
            return;
        };
        let tracker = self.alloc_tracker();
        body.stmts.insert(0, tracker_invocation(&tracker));
        let register = self.build_register_call(&tracker, Expr::Ident(decl.ident.clone()), &sites);
        self.fn_decl_signatures.insert(key, register);
    }

    fn visit_mut_fn_expr(&mut self, expr: &mut FnExpr) {
        self.fn_stack.push(FnFrame {
            key: node_key(expr.function.span),
            scope_depth: self.scope_stack.len(),
        });
        expr.visit_mut_children_with(self);
        self.fn_stack.pop();
    }

    fn visit_mut_arrow_expr(&mut self, arrow: &mut ArrowExpr) {
        self.fn_stack.push(FnFrame {
            key: node_key(arrow.span),
            scope_depth: self.scope_stack.len(),
        });
        self.env_stack.push(EnvFrame::default());
        arrow.visit_mut_children_with(self);
        let frame = self.env_stack.pop().unwrap_or_default();
        flush_env_into_arrow(frame, arrow);
        self.fn_stack.pop();
    }

    // `export default function` behaves like a named function declaration.
    fn visit_mut_default_decl(&mut self, decl: &mut DefaultDecl) {
        let DefaultDecl::Fn(expr) = decl else {
            decl.visit_mut_children_with(self);
            return;
        };
        let key = node_key(expr.function.span);
        self.fn_stack.push(FnFrame {
            key,
            scope_depth: self.scope_stack.len(),
        });
        expr.visit_mut_children_with(self);
        self.fn_stack.pop();

        let Some(sites) = self.hooks_by_fn.remove(&key) else {
            return;
        };
        let Some(body) = &mut expr.function.body else {
            return;
        };
        let tracker = self.alloc_tracker();
        body.stmts.insert(0, tracker_invocation(&tracker));
        if let Some(name) = &expr.ident {
            let register = self.build_register_call(&tracker, Expr::Ident(name.clone()), &sites);
            self.fn_decl_signatures.insert(key, register);
        }
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);

        let key = match &*expr {
            Expr::Fn(func) if func.function.body.is_some() => node_key(func.function.span),
            Expr::Arrow(arrow) => node_key(arrow.span),
            _ => return,
        };
        let Some(sites) = self.hooks_by_fn.remove(&key) else {
            return;
        };

        let tracker = self.alloc_tracker();
        match expr {
            Expr::Fn(func) => {
                if let Some(body) = &mut func.function.body {
                    body.stmts.insert(0, tracker_invocation(&tracker));
                }
            }
            Expr::Arrow(arrow) => prepend_tracker_to_arrow(arrow, &tracker),
            _ => {}
        }

        // Inside another function the tracker call can wrap the expression in
        // place; at the top level the wrapped call is kept for the statement
        // rewriter, which knows the declared name.
        let nested = self.env_stack.len() > 1;
        if nested {
            let function = expr.take();
            let wrapped = self.build_register_call(&tracker, function, &sites);
            *expr = Expr::Call(wrapped);
        } else {
            let wrapped = self.build_register_call(&tracker, expr.clone(), &sites);
            self.fn_signature_exprs.insert(key, wrapped);
        }
    }

    fn visit_mut_var_declarator(&mut self, declarator: &mut VarDeclarator) {
        if let Some(init) = &declarator.init {
            if let Expr::Call(call) = &**init {
                if is_hook_call_shape(call) {
                    self.pending_assign_targets
                        .insert(node_key(call.span), self.pat_text(&declarator.name));
                }
            }
        }
        declarator.visit_mut_children_with(self);
    }

    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        self.note_jsx_constructing_call(call);
        self.note_hook_call(call);
        call.visit_mut_children_with(self);
    }

    fn visit_mut_jsx_opening_element(&mut self, opening: &mut JSXOpeningElement) {
        if let JSXElementName::Ident(tag) = &opening.name {
            if !is_intrinsic_tag(tag.sym.as_ref()) && self.top_level_names.contains(&tag.sym) {
                self.used_as_jsx.insert(tag.sym.clone());
            }
        }
        // Not tracking <A.B /> or <a:b /> tags.
        opening.visit_mut_children_with(self);
    }
}

// -----------------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------------

fn is_declaration_file(file_name: &str) -> bool {
    file_name.ends_with(".d.ts") || file_name.ends_with(".d.mts") || file_name.ends_with(".d.cts")
}

fn has_jsx_extension(file_name: &str) -> bool {
    file_name.ends_with(".jsx") || file_name.ends_with(".tsx")
}

#[plugin_transform]
pub fn process_transform(
    mut program: Program,
    metadata: TransformPluginProgramMetadata,
) -> Program {
    let config: RefreshConfig = metadata
        .get_transform_plugin_config()
        .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
        .unwrap_or_default();

    let file_name = metadata.get_context(&TransformPluginMetadataContextKind::Filename);
    if let Some(name) = &file_name {
        if is_declaration_file(name) {
            return program;
        }
    }

    // Convert PluginSourceMapProxy to Lrc<dyn SourceMapper>
    let source_map: Option<Lrc<dyn SourceMapper>> = Some(Lrc::new(metadata.source_map));
    let source_text = source_map.as_ref().and_then(|cm| {
        let span = program.span();
        if span.is_dummy() {
            None
        } else {
            cm.span_to_snippet(span).ok()
        }
    });
    let jsx_source = file_name.as_deref().map(has_jsx_extension).unwrap_or(false);

    let mut transform =
        match RefreshTransform::new(config, source_map, Some(default_signature_hasher())) {
            Ok(transform) => transform,
            Err(error) => panic!("{error}"),
        };
    transform.process(&mut program, source_text.as_deref(), jsx_source);
    program
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use swc_core::common::{sync::Lrc, FileName, SourceMap};
    use swc_core::ecma::codegen::{text_writer::JsWriter, Config, Emitter};
    use swc_core::ecma::parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

    use super::*;

    fn parse_fixture(cm: &Lrc<SourceMap>, code: &str) -> Module {
        let fm = cm.new_source_file(
            Lrc::new(FileName::Custom("input.jsx".into())),
            code.to_string(),
        );
        let lexer = Lexer::new(
            Syntax::Es(EsSyntax {
                jsx: true,
                ..Default::default()
            }),
            Default::default(),
            StringInput::from(&*fm),
            None,
        );
        let mut parser = Parser::new_from(lexer);
        let module = parser.parse_module().expect("fixture should parse");
        assert!(parser.take_errors().is_empty());
        module
    }

    fn print_module(cm: &Lrc<SourceMap>, module: &Module) -> String {
        let mut buf = Vec::new();
        {
            let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
            let mut emitter = Emitter {
                cfg: Config::default(),
                comments: None,
                cm: cm.clone(),
                wr: writer,
            };
            emitter.emit_module(module).expect("emit should succeed");
        }
        String::from_utf8(buf).expect("emitted module is utf-8")
    }

    fn apply_with(
        code: &str,
        config: RefreshConfig,
        hasher: Option<SignatureHasher>,
        jsx_source: bool,
    ) -> String {
        let cm: Lrc<SourceMap> = Default::default();
        let module = parse_fixture(&cm, code);
        let mut program = Program::Module(module);
        let mapper: Lrc<dyn SourceMapper> = cm.clone();
        let mut transform =
            RefreshTransform::new(config, Some(mapper), hasher).expect("config should be valid");
        transform.process(&mut program, Some(code), jsx_source);
        match program {
            Program::Module(module) => print_module(&cm, &module),
            Program::Script(_) => unreachable!("fixtures parse as modules"),
        }
    }

    fn full_signatures() -> RefreshConfig {
        RefreshConfig {
            emit_full_signatures: true,
            ..RefreshConfig::default()
        }
    }

    fn transform_source(code: &str) -> String {
        apply_with(code, full_signatures(), None, true)
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    fn offset(haystack: &str, needle: &str) -> usize {
        haystack
            .find(needle)
            .unwrap_or_else(|| panic!("`{needle}` not found in:\n{haystack}"))
    }

    fn parse_first_init(code: &str) -> Box<Expr> {
        let cm: Lrc<SourceMap> = Default::default();
        let module = parse_fixture(&cm, code);
        for item in module.body {
            if let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = item {
                for declarator in var.decls {
                    if let Some(init) = declarator.init {
                        return init;
                    }
                }
            }
        }
        panic!("fixture has no variable initializer");
    }

    #[test]
    fn registers_capitalized_function_declarations() {
        let out = transform_source(indoc! {r#"
            function App() {
                return <div/>;
            }
        "#});
        assert!(out.contains("var _react_refresh_temp_1;"));
        assert!(out.contains("_react_refresh_temp_1 = App;"));
        assert!(out.contains("$RefreshReg$(_react_refresh_temp_1, \"App\")"));
    }

    #[test]
    fn leaves_lowercase_functions_alone() {
        let out = transform_source(indoc! {r#"
            function app() {
                return <div/>;
            }
            function _Private() {
                return <div/>;
            }
        "#});
        assert!(!out.contains("$RefreshReg$"));
        assert!(!out.contains("_react_refresh_temp"));
    }

    #[test]
    fn signs_function_declarations_with_hooks() {
        let out = transform_source(indoc! {r#"
            function App() {
                const [count, setCount] = useState(0);
                useEffect(() => {}, []);
                return <div>{count}</div>;
            }
        "#});
        assert!(out.contains("_react_refresh_temp_1 = $RefreshSig$();"));
        assert!(out.contains("_react_refresh_temp_1();"));
        // two hooks join into a template literal
        assert!(out.contains("`useState{[count, setCount](0)}\nuseEffect{}`"));
        // component registration precedes the signature finalization
        assert!(offset(&out, "$RefreshReg$") < offset(&out, "_react_refresh_temp_1(App,"));
        // the rewriter's hoists land above the tracker hoists
        assert!(
            offset(&out, "var _react_refresh_temp_2;") < offset(&out, "var _react_refresh_temp_1;")
        );
    }

    #[test]
    fn single_hook_signature_is_a_string_literal() {
        let out = transform_source(indoc! {r#"
            function App() {
                const [n, setN] = useState(1);
                return <p>{n}</p>;
            }
        "#});
        assert!(out.contains("(App, \"useState{[n, setN](1)}\")"));
    }

    #[test]
    fn arrow_component_signature_adopts_the_declared_name() {
        let out = transform_source(indoc! {r#"
            const Counter = () => {
                const [n, setN] = useState(1);
                return <p>{n}</p>;
            };
        "#});
        assert!(out.contains("(Counter, \"useState{[n, setN](1)}\")"));
        assert!(offset(&out, "\"Counter\"") < offset(&out, "(Counter, \"useState"));
    }

    #[test]
    fn jsx_usage_promotes_call_results_but_not_aliases() {
        let out = transform_source(indoc! {r#"
            const Styled = makeStyled();
            const Alias = Library.Component;
            function App() {
                return <section><Styled/><Alias/></section>;
            }
        "#});
        assert!(out.contains("\"Styled\""));
        assert!(!out.contains("\"Alias\""));
        assert!(out.contains("const Styled = makeStyled();"));
    }

    #[test]
    fn create_element_arguments_mark_usage() {
        let out = transform_source(indoc! {r#"
            const Panel = definePanel();
            function render() {
                return React.createElement(Panel, null);
            }
        "#});
        assert!(out.contains("\"Panel\""));
        assert!(!out.contains("\"render\""));
    }

    #[test]
    fn hoc_chains_register_innermost_first() {
        let out = transform_source(indoc! {r#"
            const Wrapped = memo(forwardRef(function Inner() {
                return <div/>;
            }));
        "#});
        assert!(out.contains(
            "memo(_react_refresh_temp_1 = forwardRef(_react_refresh_temp_2 = function Inner"
        ));
        let inner = offset(&out, "\"Wrapped$memo$forwardRef\")");
        let outer = offset(&out, "\"Wrapped$memo\")");
        let component = offset(&out, "\"Wrapped\")");
        assert!(inner < outer && outer < component);
    }

    #[test]
    fn hoc_argument_keeps_its_signature_wrapper() {
        let out = transform_source(indoc! {r#"
            const Fancy = memo(() => {
                const [on, setOn] = useState(false);
                return <button/>;
            });
        "#});
        assert!(out.contains("memo(_react_refresh_temp_2 = _react_refresh_temp_1("));
        assert!(out.contains("useState{[on, setOn](false)}"));
        assert!(out.contains("\"Fancy$memo\""));
    }

    #[test]
    fn default_export_hoc_registers_a_synthetic_name() {
        let out = transform_source(indoc! {r#"
            function Base() {
                return <div/>;
            }
            export default memo(Base);
        "#});
        assert!(out.contains("export default _react_refresh_temp_2 = memo(Base)"));
        assert!(out.contains("\"%default%\""));
        assert!(out.contains("\"Base\""));
    }

    #[test]
    fn default_export_function_with_hooks_is_wrapped() {
        let out = transform_source(indoc! {r#"
            export default () => {
                const [x, setX] = useState(2);
                return <div>{x}</div>;
            };
        "#});
        assert!(out.contains("export default _react_refresh_temp_1("));
        assert!(out.contains("useState{[x, setX](2)}"));
        assert!(!out.contains("$RefreshReg$"));
    }

    #[test]
    fn resolvable_custom_hooks_become_external_references() {
        let out = transform_source(indoc! {r#"
            import useCustom from "./use-custom";
            function App() {
                useCustom();
                return null;
            }
        "#});
        assert!(out.contains("\"useCustom{}\", false"));
        assert!(out.contains("[useCustom]"));
    }

    #[test]
    fn unresolvable_hooks_force_a_full_refresh() {
        let out = transform_source(indoc! {r#"
            function App() {
                useMystery();
                return null;
            }
        "#});
        assert!(out.contains("\"useMystery{}\", true)"));
    }

    #[test]
    fn react_qualified_hooks_neither_force_nor_track() {
        let out = transform_source(indoc! {r#"
            function App() {
                const [a, setA] = React.useState(0);
                return null;
            }
        "#});
        assert!(out.contains("(App, \"useState{[a, setA](0)}\")"));
        assert!(!out.contains(", true)"));
        assert!(!out.contains(", false"));
    }

    #[test]
    fn member_hooks_on_unknown_namespaces_force() {
        let out = transform_source(indoc! {r#"
            function App() {
                Hooks.useThing();
                return null;
            }
        "#});
        assert!(out.contains("\"Hooks.useThing{}\", true)"));
    }

    #[test]
    fn member_hooks_on_imported_namespaces_are_external() {
        let out = transform_source(indoc! {r#"
            import * as Hooks from "./hooks";
            function App() {
                Hooks.useThing();
                return null;
            }
        "#});
        assert!(out.contains("\"Hooks.useThing{}\", false"));
        assert!(out.contains("[Hooks.useThing]"));
    }

    #[test]
    fn refresh_reset_marker_forces_every_signature() {
        let out = transform_source(indoc! {r#"
            // @refresh reset
            function App() {
                const [a, setA] = useState(0);
                return null;
            }
        "#});
        assert!(out.contains("\"useState{[a, setA](0)}\", true)"));
    }

    #[test]
    fn require_like_callees_are_never_unwrapped() {
        let out = transform_source(indoc! {r#"
            const Guarded = requireAuth(() => <div/>);
        "#});
        assert!(!out.contains("$RefreshReg$"));
        assert!(!out.contains("_react_refresh_temp"));
        assert!(out.contains("requireAuth("));
    }

    #[test]
    fn jsx_used_imports_and_requires_stay_unregistered() {
        let out = transform_source(indoc! {r#"
            import { Button } from "./ui";
            const A = require("./thing");
            function App() {
                return <div><Button/><A/></div>;
            }
        "#});
        assert_eq!(count(&out, "$RefreshReg$("), 1);
        assert!(out.contains("\"App\""));
    }

    #[test]
    fn render_props_with_hooks_generate_nested_trackers() {
        let out = transform_source(indoc! {r#"
            function Test() {
                const [foo, setFoo] = useState(0);
                return (
                    <Foo>
                        {() => (
                            <Bar label="testLabel">
                                {() => {
                                    useEffect(() => {
                                        setFoo((foo) => foo + 1);
                                    }, [setFoo]);
                                    return <div>{foo}</div>;
                                }}
                            </Bar>
                        )}
                    </Foo>
                );
            }

            function Foo(props) {
                const { children } = props;
                return <div>{typeof children === "function" ? children(props) : children}</div>;
            }

            function Bar(props) {
                const { label, children } = props;
                return <div>{label}{typeof children === "function" ? children(props) : children}</div>;
            }
        "#});
        assert_eq!(count(&out, "$RefreshReg$("), 3);
        assert_eq!(count(&out, "$RefreshSig$()"), 2);
        assert!(out.contains("(Test, \"useState{[foo, setFoo](0)}\")"));
        // the nested closure finalizes in place, inside the render prop
        let bar_open = offset(&out, "<Bar");
        let bar_close = offset(&out, "</Bar>");
        let nested_signature = offset(&out, "\"useEffect{}\"");
        assert!(bar_open < nested_signature && nested_signature < bar_close);
    }

    #[test]
    fn files_without_hooks_or_jsx_pass_through() {
        let code = "const value = 1;\nconsole.log(value);\n";
        let cm: Lrc<SourceMap> = Default::default();
        let expected = print_module(&cm, &parse_fixture(&cm, code));
        let out = apply_with(code, full_signatures(), None, false);
        assert_eq!(out, expected);
    }

    #[test]
    fn output_is_deterministic() {
        let code = indoc! {r#"
            const Counter = () => {
                const [n, setN] = useState(1);
                return <p>{n}</p>;
            };
            export default memo(Counter);
        "#};
        assert_eq!(transform_source(code), transform_source(code));
    }

    #[test]
    fn signatures_go_through_the_configured_hasher() {
        let code = indoc! {r#"
            function App() {
                const [n, setN] = useState(1);
                return <p>{n}</p>;
            }
        "#};
        let hashed = apply_with(
            code,
            RefreshConfig::default(),
            Some(Box::new(|signature| Some(format!("#{}#", signature.len())))),
            true,
        );
        assert!(hashed.contains("\"#22#\""));
        assert!(!hashed.contains("useState{"));
    }

    #[test]
    fn hasher_failure_falls_back_to_raw_signatures() {
        let code = indoc! {r#"
            function App() {
                const [n, setN] = useState(1);
                return <p>{n}</p>;
            }
        "#};
        let out = apply_with(code, RefreshConfig::default(), Some(Box::new(|_| None)), true);
        assert!(out.contains("useState{[n, setN](1)}"));
    }

    #[test]
    fn default_hasher_produces_base64_sha1() {
        let hasher = default_signature_hasher();
        let digest = hasher("useState{}").expect("hashing cannot fail");
        assert_eq!(digest.len(), 28);
        assert!(digest.ends_with('='));
    }

    #[test]
    fn invalid_runtime_identifiers_are_rejected() {
        let config = RefreshConfig {
            refresh_reg: Some("not an identifier".to_string()),
            ..RefreshConfig::default()
        };
        let result = RefreshTransform::new(config, None, None);
        assert!(matches!(result, Err(RefreshError::Config(_))));
    }

    #[test]
    fn higher_order_component_shapes() {
        assert!(is_higher_order_component_like(&parse_first_init(
            "const A = hoc(Inner);"
        )));
        assert!(is_higher_order_component_like(&parse_first_init(
            "const A = x.y(() => null);"
        )));
        assert!(!is_higher_order_component_like(&parse_first_init(
            "const A = hoc(inner);"
        )));
        assert!(!is_higher_order_component_like(&parse_first_init(
            "const A = require(\"x\");"
        )));
        assert!(!is_higher_order_component_like(&parse_first_init(
            "const A = hoc(require(\"x\"));"
        )));
        assert!(!is_higher_order_component_like(&parse_first_init(
            "const A = hoc();"
        )));
    }

    #[test]
    fn unwanted_component_definitions() {
        assert!(is_unwanted_component_definition(&parse_first_init(
            "const A = B;"
        )));
        assert!(is_unwanted_component_definition(&parse_first_init(
            "const A = B.X;"
        )));
        assert!(is_unwanted_component_definition(&parse_first_init(
            "const A = require(\"x\");"
        )));
        assert!(is_unwanted_component_definition(&parse_first_init(
            "const A = flag ? X : Y;"
        )));
        assert!(!is_unwanted_component_definition(&parse_first_init(
            "const A = makeThing();"
        )));
    }

    #[test]
    fn intrinsic_tags_and_casing() {
        assert!(is_intrinsic_tag("div"));
        assert!(is_intrinsic_tag("my-element"));
        assert!(is_intrinsic_tag("svg:path"));
        assert!(!is_intrinsic_tag("App"));
        assert!(starts_with_lowercase("_App"));
        assert!(!starts_with_lowercase("App"));
    }

    #[test]
    fn nested_function_declarations_sign_inside_their_parent() {
        let out = transform_source(indoc! {r#"
            function Outer() {
                function Inner() {
                    const [v, setV] = useState(3);
                    return v;
                }
                return <div>{Inner()}</div>;
            }
        "#});
        assert!(out.contains("(Inner, \"useState{[v, setV](3)}\")"));
        assert_eq!(count(&out, "$RefreshSig$()"), 1);
        assert!(offset(&out, "function Outer") < offset(&out, "= $RefreshSig$()"));
        assert_eq!(count(&out, "$RefreshReg$("), 1);
        assert!(out.contains("\"Outer\""));
    }

    #[test]
    fn module_level_hook_calls_are_ignored() {
        let out = transform_source(indoc! {r#"
            useState(0);
            function App() {
                return <div/>;
            }
        "#});
        assert!(!out.contains("$RefreshSig$"));
        assert!(out.contains("\"App\""));
    }

    #[test]
    fn scripts_are_rewritten_like_modules() {
        let cm: Lrc<SourceMap> = Default::default();
        let fm = cm.new_source_file(
            Lrc::new(FileName::Custom("input.js".into())),
            "function App() { return React.createElement(\"div\", null); }".to_string(),
        );
        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            Default::default(),
            StringInput::from(&*fm),
            None,
        );
        let mut parser = Parser::new_from(lexer);
        let script = parser.parse_script().expect("script should parse");
        let mut program = Program::Script(script);
        let mapper: Lrc<dyn SourceMapper> = cm.clone();
        let mut transform = RefreshTransform::new(full_signatures(), Some(mapper), None)
            .expect("config should be valid");
        transform.process(&mut program, None, true);
        let Program::Script(script) = program else {
            panic!("program kind should be preserved");
        };
        // var hoist, the function, the temp assignment, the register call
        assert_eq!(script.body.len(), 4);
        assert!(matches!(script.body.first(), Some(Stmt::Decl(Decl::Var(_)))));
    }

    #[test]
    fn plain_assignment_targets_are_captured() {
        let out = transform_source(indoc! {r#"
            function App() {
                const state = useState(5);
                return null;
            }
        "#});
        assert!(out.contains("(App, \"useState{state(5)}\")"));
    }

    #[test]
    fn use_reducer_captures_its_initial_state() {
        let out = transform_source(indoc! {r#"
            function App() {
                const [s, dispatch] = useReducer(reducer, initialArg);
                return null;
            }
        "#});
        assert!(out.contains("(App, \"useReducer{[s, dispatch](initialArg)}\")"));
    }

    #[test]
    fn concise_arrows_get_a_sequence_prologue() {
        let out = transform_source(indoc! {r#"
            const Memoized = () => useMemo(() => 42, []);
        "#});
        assert!(out.contains("_react_refresh_temp_1(), useMemo("));
        assert!(out.contains("(Memoized, \"useMemo{}\")"));
    }
}
