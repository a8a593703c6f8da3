//! Utility functions for the container
//!
//! Naming helpers shared by the resolver, the scanner and the derive output,
//! plus the creation tracker used for cycle detection during instantiation.

/// Naming convention utilities for component keys
pub mod naming {
    use crate::constants::FILTER_SEPARATOR;

    /// Strips the `dyn ` marker that `std::any::type_name` puts in front of
    /// trait object names.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebox_core::utils::naming::strip_dyn;
    ///
    /// assert_eq!(strip_dyn("dyn app::Greeter"), "app::Greeter");
    /// assert_eq!(strip_dyn("app::Greeter"), "app::Greeter");
    /// ```
    pub fn strip_dyn(type_name: &str) -> &str {
        type_name.strip_prefix("dyn ").unwrap_or(type_name)
    }

    /// Returns the last path segment of a fully-qualified type name, without
    /// generic arguments.
    ///
    /// This is the name configuration sources fall back to when a component
    /// has no explicit name.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebox_core::utils::naming::simple_name;
    ///
    /// assert_eq!(simple_name("app::services::UserService"), "UserService");
    /// assert_eq!(simple_name("dyn app::Greeter"), "Greeter");
    /// assert_eq!(simple_name("app::Cache<alloc::string::String>"), "Cache");
    /// assert_eq!(simple_name("Plain"), "Plain");
    /// ```
    pub fn simple_name(type_name: &str) -> &str {
        let name = strip_dyn(type_name);
        let name = match name.find('<') {
            Some(idx) => &name[..idx],
            None => name,
        };
        match name.rfind("::") {
            Some(idx) => &name[idx + 2..],
            None => name,
        }
    }

    /// Splits a `key=value` filter expression on its first separator.
    ///
    /// Returns `None` when the expression has no separator or an empty key.
    /// Both halves are trimmed.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebox_core::utils::naming::split_filter;
    ///
    /// assert_eq!(split_filter("name=instance1"), Some(("name", "instance1")));
    /// assert_eq!(split_filter("url=jdbc:x?a=b"), Some(("url", "jdbc:x?a=b")));
    /// assert_eq!(split_filter("missing"), None);
    /// ```
    pub fn split_filter(expression: &str) -> Option<(&str, &str)> {
        let (key, value) = expression.split_once(FILTER_SEPARATOR)?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key, value.trim()))
    }
}

/// Dependency resolution utilities
pub mod dependency {
    use std::collections::HashSet;

    /// Tracks components currently being built to detect construction cycles.
    ///
    /// Unlike a plain set this keeps insertion order, so a detected cycle can
    /// be reported as the path that closed it.
    #[derive(Debug, Default)]
    pub struct CreationTracker {
        stack: Vec<String>,
        members: HashSet<String>,
    }

    impl CreationTracker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Checks if a component is currently being built.
        pub fn is_creating(&self, name: &str) -> bool {
            self.members.contains(name)
        }

        /// Marks a component as being built.
        ///
        /// Returns the cycle path (first occurrence through `name` again) if the
        /// component is already on the stack.
        pub fn start_creating(&mut self, name: &str) -> Result<(), Vec<String>> {
            if self.members.contains(name) {
                return Err(self.cycle_through(name));
            }
            self.members.insert(name.to_string());
            self.stack.push(name.to_string());
            Ok(())
        }

        /// Marks a component as finished being built.
        pub fn finish_creating(&mut self, name: &str) {
            if let Some(pos) = self.stack.iter().rposition(|n| n == name) {
                self.stack.remove(pos);
            }
            self.members.remove(name);
        }

        /// Snapshot of the components currently being built, outermost first.
        pub fn current_creating(&self) -> &[String] {
            &self.stack
        }

        fn cycle_through(&self, name: &str) -> Vec<String> {
            let start = self.stack.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle = self.stack[start..].to_vec();
            cycle.push(name.to_string());
            cycle
        }
    }
}
