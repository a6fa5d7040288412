mod latch;
pub(crate) use self::latch::Latch;

mod scope_guard;
pub(crate) use self::scope_guard::ScopeGuard;
