use crate::evaluator::EvalResult;
use crate::source::Span;
use crate::types::Node;
use crate::value::Variable;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use tracing::trace;

/// Native callback: evaluated arguments and the output stream in, optional
/// fresh variable out. The evaluator registers the result as a temporary.
pub type NativeFunc = fn(&[Rc<Variable>], &mut dyn Write, Span) -> EvalResult<Option<Variable>>;

/// A function defined with the `function` special form.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub parameters: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Clone)]
pub enum Callable {
    User(Rc<UserFunction>),
    Native(NativeFunc, String), // The function pointer and its name (for display/debug)
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::User(function) => write!(f, "User({:?})", function.parameters),
            Callable::Native(_, name) => write!(f, "Native({})", name),
        }
    }
}

// Prefix for generated temporary keys. The lexer never produces a word
// starting with '#', so user code cannot name a temporary.
const TEMPORARY_PREFIX: char = '#';

/// Variables and callables of one interpreter.
///
/// Temporaries (literals and call results) live in the variable map under
/// generated keys and are owned by the arena of the frame that created them.
/// Leaving a frame releases its arena, except for the value the frame
/// returns, which moves to the enclosing arena.
#[derive(Debug)]
pub struct Environment {
    variables: HashMap<String, Rc<Variable>>,
    callables: HashMap<String, Callable>,
    // Temporary keys created at top level, which has no frame to pop
    top_arena: Vec<String>,
    // frames[depth - 1] holds the temporary keys created at that depth
    frames: Vec<Vec<String>>,
    next_temporary: u64,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Creates an empty environment without any built-ins.
    pub fn new() -> Self {
        Environment {
            variables: HashMap::new(),
            callables: HashMap::new(),
            top_arena: Vec::new(),
            frames: Vec::new(),
            next_temporary: 0,
        }
    }

    /// Creates an environment with the built-in library registered.
    pub fn new_global_populated() -> Self {
        let mut env = Environment::new();
        crate::primitives::register(&mut env);
        env
    }

    /// Current frame depth; 0 at top level.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, name: &str) -> Option<Rc<Variable>> {
        self.variables.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Binds `name` to a fresh variable, replacing any previous binding.
    pub fn declare(&mut self, name: &str, variable: Variable) {
        self.variables.insert(name.to_string(), Rc::new(variable));
    }

    /// Rebinds an existing name. Returns false if the name was never bound.
    pub fn rebind(&mut self, name: &str, variable: Rc<Variable>) -> bool {
        match self.variables.get_mut(name) {
            Some(slot) => {
                *slot = variable;
                true
            }
            None => false,
        }
    }

    /// Binds a function parameter, returning the binding it shadows.
    pub fn bind_local(&mut self, name: &str, variable: Rc<Variable>) -> Option<Rc<Variable>> {
        self.variables.insert(name.to_string(), variable)
    }

    /// Undoes `bind_local` by restoring the shadowed binding, if any.
    pub fn restore(&mut self, name: &str, shadowed: Option<Rc<Variable>>) {
        match shadowed {
            Some(variable) => {
                self.variables.insert(name.to_string(), variable);
            }
            None => {
                self.variables.remove(name);
            }
        }
    }

    /// Registers an anonymous variable in the current frame's arena.
    pub fn temporary(&mut self, variable: Variable) -> Rc<Variable> {
        self.next_temporary += 1;
        let key = format!("{}tmp{}", TEMPORARY_PREFIX, self.next_temporary);
        let variable = Rc::new(variable.in_frame(self.depth()));
        self.variables.insert(key.clone(), variable.clone());
        self.current_arena().push(key);
        variable
    }

    pub fn temporary_count(&self) -> usize {
        self.top_arena.len() + self.frames.iter().map(Vec::len).sum::<usize>()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Leaves the current frame, releasing its temporaries except `keep`.
    pub fn pop_frame(&mut self, keep: Option<&Rc<Variable>>) {
        let Some(arena) = self.frames.pop() else {
            return;
        };
        let escaped = self.release(arena, keep);
        self.current_arena().extend(escaped);
    }

    /// Position in the current arena, for use with `release_since`.
    pub fn arena_mark(&self) -> usize {
        self.frames.last().unwrap_or(&self.top_arena).len()
    }

    /// Releases the temporaries created in the current frame after `mark`,
    /// except `keep`.
    pub fn release_since(&mut self, mark: usize, keep: Option<&Rc<Variable>>) {
        let arena = self.current_arena();
        if mark >= arena.len() {
            return;
        }
        let released: Vec<String> = arena.drain(mark..).collect();
        let kept = self.release(released, keep);
        self.current_arena().extend(kept);
    }

    fn release(&mut self, keys: Vec<String>, keep: Option<&Rc<Variable>>) -> Vec<String> {
        let mut kept = Vec::new();
        let count = keys.len();
        for key in keys {
            let escapes = match (keep, self.variables.get(&key)) {
                (Some(keep), Some(variable)) => Rc::ptr_eq(keep, variable),
                _ => false,
            };
            if escapes {
                kept.push(key);
            } else {
                self.variables.remove(&key);
            }
        }
        trace!(
            depth = self.depth(),
            released = count - kept.len(),
            "released temporaries"
        );
        kept
    }

    fn current_arena(&mut self) -> &mut Vec<String> {
        match self.frames.last_mut() {
            Some(arena) => arena,
            None => &mut self.top_arena,
        }
    }

    pub fn define_function(&mut self, name: &str, function: UserFunction) {
        self.callables
            .insert(name.to_string(), Callable::User(Rc::new(function)));
    }

    pub fn callable(&self, name: &str) -> Option<Callable> {
        self.callables.get(name).cloned()
    }

    /// Helper to add a native function to the environment.
    pub fn add_primitive(&mut self, name: &str, func: NativeFunc) {
        self.callables
            .insert(name.to_string(), Callable::Native(func, name.to_string()));
    }

    /// Named variables and callables, without temporaries.
    pub fn get_identifiers(&self) -> HashSet<String> {
        self.variables
            .keys()
            .filter(|name| !name.starts_with(TEMPORARY_PREFIX))
            .chain(self.callables.keys())
            .cloned()
            .collect()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    #[test]
    fn test_declare_and_get() {
        let mut env = Environment::new();
        env.declare("x", Variable::declared(Kind::Word));

        let x = env.get("x").expect("x should be bound");
        assert_eq!(x.kind(), Kind::Word);
        assert_eq!(x.frame(), 0);
        assert!(env.get("y").is_none());
    }

    #[test]
    fn test_redeclare_replaces_binding() {
        let mut env = Environment::new();
        env.declare("x", Variable::declared(Kind::Word));
        env.declare("x", Variable::declared(Kind::Bool));
        assert_eq!(env.get("x").unwrap().kind(), Kind::Bool);
    }

    #[test]
    fn test_rebind_requires_existing_binding() {
        let mut env = Environment::new();
        assert!(!env.rebind("x", Rc::new(Variable::word(1))));
        assert!(env.get("x").is_none());

        env.declare("x", Variable::declared(Kind::Word));
        let old = env.get("x").unwrap();
        assert!(env.rebind("x", Rc::new(Variable::word(1))));
        assert_eq!(env.get("x").unwrap().as_integer(), Some(1));
        // The old variable is untouched
        assert_eq!(old.as_integer(), None);
    }

    #[test]
    fn test_temporaries_get_unique_keys() {
        let mut env = Environment::new();
        let a = env.temporary(Variable::word(1));
        let b = env.temporary(Variable::word(1));
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(env.temporary_count(), 2);
        assert!(env.get_identifiers().is_empty());
    }

    #[test]
    fn test_temporaries_are_tagged_with_depth() {
        let mut env = Environment::new();
        env.push_frame();
        env.push_frame();
        let tmp = env.temporary(Variable::word(5));
        assert_eq!(env.depth(), 2);
        assert_eq!(tmp.frame(), 2);
    }

    #[test]
    fn test_pop_frame_releases_all_but_returned() {
        let mut env = Environment::new();
        env.push_frame();
        env.temporary(Variable::word(1));
        let result = env.temporary(Variable::word(2));
        env.temporary(Variable::word(3));
        env.pop_frame(Some(&result));

        assert_eq!(env.depth(), 0);
        assert_eq!(env.temporary_count(), 1);

        // The escaped value is released by the enclosing frame
        env.push_frame();
        env.pop_frame(None);
        assert_eq!(env.temporary_count(), 1);
        env.release_since(0, None);
        assert_eq!(env.temporary_count(), 0);
    }

    #[test]
    fn test_pop_frame_at_top_level_is_a_no_op() {
        let mut env = Environment::new();
        let tmp = env.temporary(Variable::word(1));
        env.pop_frame(None);

        assert_eq!(env.depth(), 0);
        assert_eq!(env.temporary_count(), 1);
        assert_eq!(env.arena_mark(), 1);
        assert_eq!(tmp.frame(), 0);

        // New frames still stack on top of the top-level arena
        env.push_frame();
        assert_eq!(env.arena_mark(), 0);
        env.pop_frame(None);
        env.release_since(0, None);
        assert_eq!(env.temporary_count(), 0);
    }

    #[test]
    fn test_release_since_mark() {
        let mut env = Environment::new();
        env.push_frame();
        let early = env.temporary(Variable::word(1));
        let mark = env.arena_mark();
        env.temporary(Variable::word(2));
        let kept = env.temporary(Variable::word(3));
        env.release_since(mark, Some(&kept));

        assert_eq!(env.temporary_count(), 2);
        assert_eq!(early.as_integer(), Some(1));
        env.pop_frame(None);
        assert_eq!(env.temporary_count(), 0);
    }

    #[test]
    fn test_named_binding_survives_release() {
        let mut env = Environment::new();
        env.declare("x", Variable::declared(Kind::Word));
        env.push_frame();
        let tmp = env.temporary(Variable::word(9));
        assert!(env.rebind("x", tmp));
        env.pop_frame(None);

        assert_eq!(env.temporary_count(), 0);
        assert_eq!(env.get("x").unwrap().as_integer(), Some(9));
    }

    #[test]
    fn test_bind_local_and_restore() {
        let mut env = Environment::new();
        env.declare("n", Variable::word(1));
        let shadowed = env.bind_local("n", Rc::new(Variable::word(2)));
        let fresh = env.bind_local("m", Rc::new(Variable::word(3)));
        assert_eq!(env.get("n").unwrap().as_integer(), Some(2));

        env.restore("m", fresh);
        env.restore("n", shadowed);
        assert_eq!(env.get("n").unwrap().as_integer(), Some(1));
        assert!(env.get("m").is_none());
    }

    #[test]
    fn test_populated_environment_has_builtins() {
        let env = Environment::new_global_populated();
        for name in ["add", "print", "gt", "lt", "address"] {
            assert!(
                matches!(env.callable(name), Some(Callable::Native(_, _))),
                "missing {}",
                name
            );
        }
        assert!(env.callable("plus").is_none());
    }

    #[test]
    fn test_user_functions_are_callables() {
        let mut env = Environment::new();
        env.define_function(
            "noop",
            UserFunction {
                parameters: vec!["a".to_string()],
                body: vec![],
            },
        );
        match env.callable("noop") {
            Some(Callable::User(function)) => assert_eq!(function.parameters, ["a"]),
            other => panic!("Expected user function, got {:?}", other),
        }
        assert!(env.get_identifiers().contains("noop"));
    }
}
