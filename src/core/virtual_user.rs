use std::sync::Arc;

use reqwest::cookie::Jar;

use super::variable_pool::VariableEnvironment;

/// Per-virtual-user cookie store. Expired cookies are dropped on lookup.
pub type CookieJar = Jar;

/// State owned by one virtual user for the whole run.
///
/// Nothing here is shared with other virtual users: the environment is a
/// private copy of the run's base environment and the cookie jar is fresh.
#[derive(Debug)]
pub struct VirtualUserContext {
    vu_id: u32,
    iteration: u64,
    cookies: Arc<CookieJar>,
    env: VariableEnvironment,
}

impl VirtualUserContext {
    pub fn new(vu_id: u32, base_env: &VariableEnvironment) -> Self {
        Self {
            vu_id,
            iteration: 0,
            cookies: Arc::new(CookieJar::default()),
            env: base_env.clone(),
        }
    }

    pub fn vu_id(&self) -> u32 {
        self.vu_id
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Advance and return the iteration counter.
    pub fn next_iteration(&mut self) -> u64 {
        self.iteration += 1;
        self.iteration
    }

    pub fn cookies(&self) -> &Arc<CookieJar> {
        &self.cookies
    }

    pub fn env(&self) -> &VariableEnvironment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut VariableEnvironment {
        &mut self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contexts_are_isolated() {
        let base = VariableEnvironment::from_value(json!({"user": "base"}));
        let mut a = VirtualUserContext::new(0, &base);
        let b = VirtualUserContext::new(1, &base);
        a.env_mut().set("user", json!("changed"));
        assert_eq!(b.env().get("user"), Some(&json!("base")));
        assert_eq!(base.get("user"), Some(&json!("base")));
        assert!(!Arc::ptr_eq(a.cookies(), b.cookies()));
    }

    #[test]
    fn test_iteration_counter() {
        let mut ctx = VirtualUserContext::new(3, &VariableEnvironment::new());
        assert_eq!(ctx.iteration(), 0);
        assert_eq!(ctx.next_iteration(), 1);
        assert_eq!(ctx.next_iteration(), 2);
        assert_eq!(ctx.vu_id(), 3);
    }
}
