//! # Worker Thread Attributes
//!
//! Settings shared by every domain worker, fixed at initialization.

use std::thread;

use crate::domain::DomainId;
use crate::error::{InitError, InitResult};

/// Default worker stack: 128 MiB. The solver call tree keeps large
/// temporaries on the stack.
pub const DEFAULT_STACK_SIZE: usize = 128 * 1024 * 1024;

/// Smallest stack a worker may be given.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Immutable attributes applied to every spawned worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadAttributes {
    stack_size: usize,
    name_prefix: String,
}

impl Default for ThreadAttributes {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            name_prefix: "domain".to_owned(),
        }
    }
}

impl ThreadAttributes {
    /// Attributes with a custom stack size and the default name prefix.
    ///
    /// # Errors
    ///
    /// [`InitError::InvalidStackSize`] below [`MIN_STACK_SIZE`].
    pub fn with_stack_size(stack_size: usize) -> InitResult<Self> {
        if stack_size < MIN_STACK_SIZE {
            return Err(InitError::InvalidStackSize {
                requested: stack_size,
                minimum: MIN_STACK_SIZE,
            });
        }
        Ok(Self {
            stack_size,
            ..Self::default()
        })
    }

    /// Replaces the thread name prefix (`<prefix>-<domain>`).
    ///
    /// # Errors
    ///
    /// [`InitError::InvalidThreadName`] for an empty prefix or one containing
    /// a NUL byte (thread names are C strings).
    pub fn named(mut self, prefix: impl Into<String>) -> InitResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.contains('\0') {
            return Err(InitError::InvalidThreadName(prefix));
        }
        self.name_prefix = prefix;
        Ok(self)
    }

    /// Worker stack size in bytes.
    #[inline]
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Worker thread name prefix.
    #[inline]
    #[must_use]
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Thread name for a domain worker.
    #[must_use]
    pub fn thread_name(&self, domain: DomainId) -> String {
        format!("{}-{:02}", self.name_prefix, domain.get())
    }

    pub(crate) fn builder(&self, domain: DomainId) -> thread::Builder {
        thread::Builder::new()
            .name(self.thread_name(domain))
            .stack_size(self.stack_size)
    }
}
