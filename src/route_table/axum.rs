use super::{HandlerAction, HostRoute, HttpMethod, RouteTable};
use crate::parser::ParsedFile;
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashSet;
use syn::{visit::Visit, Expr, ExprMethodCall, Lit};

/// Routes found statically in axum `Router` chains.
///
/// Every function (or `let` binding) that builds a router becomes a router unit. Units
/// combined into others with `.nest(prefix, unit)` or `.merge(unit)` inherit the prefix;
/// the remaining units are the roots the route list is expanded from.
pub struct AxumRouteTable {
    routes: Vec<HostRoute>,
}

impl AxumRouteTable {
    pub fn new(parsed_files: &[ParsedFile]) -> Self {
        let mut visitor = AxumVisitor::new();
        for parsed_file in parsed_files {
            visitor.visit_file(&parsed_file.syntax_tree);
        }

        let routes = visitor.expand();
        debug!("Found {} axum routes", routes.len());
        Self { routes }
    }
}

impl RouteTable for AxumRouteTable {
    fn routes(&self) -> Vec<HostRoute> {
        self.routes.clone()
    }
}

#[derive(Debug, Default)]
struct RouterUnit {
    routes: Vec<UnitRoute>,
    /// (prefix, target unit)
    children: Vec<(String, String)>,
}

#[derive(Debug)]
struct UnitRoute {
    path: String,
    method: HttpMethod,
    action: Option<HandlerAction>,
}

/// Visitor for traversing the AST and collecting router units
struct AxumVisitor {
    units: IndexMap<String, RouterUnit>,
    /// function whose body is being visited
    current_fn: String,
    /// unit the current expression contributes to
    current_unit: String,
    locals: HashSet<String>,
    anonymous: usize,
}

impl AxumVisitor {
    fn new() -> Self {
        Self {
            units: IndexMap::new(),
            current_fn: String::new(),
            current_unit: String::new(),
            locals: HashSet::new(),
            anonymous: 0,
        }
    }

    /// Walks a method chain such as `Router::new().route(..).nest(..)` in source order.
    fn parse_chain(&mut self, expr: &ExprMethodCall, unit: &str) {
        let mut calls = Vec::new();
        let mut current = Some(expr);
        while let Some(call) = current {
            calls.push(call);
            current = match &*call.receiver {
                Expr::MethodCall(receiver) => Some(receiver),
                _ => None,
            };
        }

        for call in calls.into_iter().rev() {
            match call.method.to_string().as_str() {
                "route" => self.parse_route_method(call, unit),
                "nest" => {
                    let Some(prefix) = call.args.first().and_then(extract_string_literal) else {
                        continue;
                    };
                    if let Some(target) = call.args.iter().nth(1) {
                        self.link(unit, normalize_path(&prefix), target);
                    }
                }
                "merge" => {
                    if let Some(target) = call.args.first() {
                        self.link(unit, String::new(), target);
                    }
                }
                _ => {}
            }
        }
    }

    /// Parse a .route() method call
    fn parse_route_method(&mut self, expr: &ExprMethodCall, unit: &str) {
        // .route(path, method_router)
        if expr.args.len() < 2 {
            return;
        }
        let Some(path) = extract_string_literal(&expr.args[0]) else {
            return;
        };
        let path = normalize_path(&path);

        for (method, action) in parse_method_router(&expr.args[1]) {
            self.units
                .entry(unit.to_string())
                .or_default()
                .routes
                .push(UnitRoute {
                    path: path.clone(),
                    method,
                    action,
                });
        }
    }

    fn link(&mut self, unit: &str, prefix: String, target: &Expr) {
        let target_unit = match target {
            // .nest("/tasks", task_routes())
            Expr::Call(call) => match &*call.func {
                Expr::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
                _ => None,
            },
            // .nest("/tasks", tasks) with `let tasks = Router::new()..`
            Expr::Path(path) => path.path.get_ident().map(|ident| {
                let local = format!("{}::{}", self.current_fn, ident);
                if self.locals.contains(&local) {
                    local
                } else {
                    ident.to_string()
                }
            }),
            // .nest("/tasks", Router::new().route(..))
            Expr::MethodCall(inline) => {
                self.anonymous += 1;
                let name = format!("{}::#{}", self.current_fn, self.anonymous);
                self.units.entry(name.clone()).or_default();
                self.parse_chain(inline, &name);
                Some(name)
            }
            _ => None,
        };

        match target_unit {
            Some(target_unit) => self
                .units
                .entry(unit.to_string())
                .or_default()
                .children
                .push((prefix, target_unit)),
            None => debug!("Unsupported nested router expression in {}", self.current_fn),
        }
    }

    /// Expands every root unit into host routes.
    fn expand(&self) -> Vec<HostRoute> {
        let targets: HashSet<&str> = self
            .units
            .values()
            .flat_map(|u| u.children.iter().map(|(_, target)| target.as_str()))
            .collect();

        let mut routes = Vec::new();
        for name in self.units.keys() {
            if !targets.contains(name.as_str()) {
                let mut stack = Vec::new();
                self.expand_unit(name, "", &mut stack, &mut routes);
            }
        }
        routes
    }

    fn expand_unit<'a>(
        &'a self,
        name: &'a str,
        prefix: &str,
        stack: &mut Vec<&'a str>,
        routes: &mut Vec<HostRoute>,
    ) {
        if stack.contains(&name) {
            warn!("Router {} nests itself, ignoring the cycle", name);
            return;
        }
        let Some(unit) = self.units.get(name) else {
            debug!("Nested router {} not found", name);
            return;
        };

        stack.push(name);
        for route in &unit.routes {
            let mut host = HostRoute::new(vec![route.method], combine_paths(prefix, &route.path));
            host.action = route.action.clone();
            routes.push(host);
        }
        for (child_prefix, target) in &unit.children {
            let combined = combine_paths(prefix, child_prefix);
            self.expand_unit(target, &combined, stack, routes);
        }
        stack.pop();
    }
}

impl<'ast> Visit<'ast> for AxumVisitor {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let method_name = node.method.to_string();

        if matches!(method_name.as_str(), "route" | "nest" | "merge") {
            let unit = self.current_unit.clone();
            self.units.entry(unit.clone()).or_default();
            self.parse_chain(node, &unit);
            return;
        }

        // Continue visiting child nodes
        syn::visit::visit_expr_method_call(self, node);
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        if let (syn::Pat::Ident(pat), Some(init)) = (&node.pat, &node.init) {
            let local = format!("{}::{}", self.current_fn, pat.ident);
            let previous = std::mem::replace(&mut self.current_unit, local.clone());
            let before = self.units.len();
            self.visit_expr(&init.expr);
            if self.units.len() > before || self.units.contains_key(&local) {
                self.locals.insert(local);
            }
            self.current_unit = previous;
            return;
        }
        syn::visit::visit_local(self, node);
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let fn_name = node.sig.ident.to_string();
        self.enter_fn(fn_name, |visitor| syn::visit::visit_item_fn(visitor, node));
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let fn_name = node.sig.ident.to_string();
        self.enter_fn(fn_name, |visitor| syn::visit::visit_impl_item_fn(visitor, node));
    }
}

impl AxumVisitor {
    fn enter_fn(&mut self, fn_name: String, visit: impl FnOnce(&mut Self)) {
        let previous_fn = std::mem::replace(&mut self.current_fn, fn_name.clone());
        let previous_unit = std::mem::replace(&mut self.current_unit, fn_name);
        visit(self);
        self.current_fn = previous_fn;
        self.current_unit = previous_unit;
    }
}

/// `get(list).post(store)` -> one entry per method.
fn parse_method_router(expr: &Expr) -> Vec<(HttpMethod, Option<HandlerAction>)> {
    let mut entries = Vec::new();
    let mut current = expr;
    loop {
        match current {
            Expr::MethodCall(call) => {
                if let Ok(method) = call.method.to_string().parse::<HttpMethod>() {
                    let action = call.args.first().and_then(handler_action);
                    entries.push((method, action));
                }
                current = &call.receiver;
            }
            Expr::Call(call) => {
                if let Expr::Path(path) = &*call.func {
                    if let Some(segment) = path.path.segments.last() {
                        if let Ok(method) = segment.ident.to_string().parse::<HttpMethod>() {
                            let action = call.args.first().and_then(handler_action);
                            entries.push((method, action));
                        }
                    }
                }
                break;
            }
            _ => break,
        }
    }
    entries.reverse();
    entries
}

/// Handler expression -> action. Closures have no named handler.
fn handler_action(expr: &Expr) -> Option<HandlerAction> {
    match expr {
        Expr::Path(path_expr) => {
            let segments: Vec<String> = path_expr
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect();
            match segments.as_slice() {
                [] => None,
                [function] => Some(HandlerAction::Function(function.clone())),
                [owner @ .., method] => {
                    Some(HandlerAction::Pair(owner.join("::"), method.clone()))
                }
            }
        }
        _ => None,
    }
}

/// Extract a string literal from an expression
fn extract_string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => {
            if let Lit::Str(lit_str) = &expr_lit.lit {
                Some(lit_str.value())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// `/tasks/:task/*rest` and `/tasks/{*rest}` -> `/tasks/{task}/{rest}`
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').or_else(|| segment.strip_prefix('*')) {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix("{*") {
                format!("{{{}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Combine a prefix and path, handling slashes correctly
fn combine_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}
