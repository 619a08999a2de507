use z3::{Config, Context};

thread_local! {
    // z3 contexts are not thread safe, every worker gets its own.
    static CTX: Context = Context::new(&Config::new());
}

/// Run `f` with the Z3 context of the current thread.
///
/// Terms built inside `f` cannot outlive it.
pub fn with_context<R>(f: impl FnOnce(&Context) -> R) -> R {
    CTX.with(|ctx| f(ctx))
}
