//! Where clipboard text actually lives.

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;

/// Blocking access to a clipboard. Callers run these off the async threads.
pub trait ClipboardBackend: Send + Sync + 'static {
    /// Current text. Failures and non-text contents read as empty.
    fn read(&self) -> String;
    fn write(&self, text: &str) -> Result<()>;
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("{} lock poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

/// In-process clipboard for headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(initial.into()),
        }
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read(&self) -> String {
        lock_or_recover(&self.text, "Memory clipboard").clone()
    }

    fn write(&self, text: &str) -> Result<()> {
        *lock_or_recover(&self.text, "Memory clipboard") = text.to_string();
        Ok(())
    }
}

/// The desktop clipboard via `arboard`. The handle is opened lazily and kept
/// alive, since on X11 written text is only served while it exists.
#[cfg(feature = "system-clipboard")]
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

#[cfg(feature = "system-clipboard")]
impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_handle<T>(
        &self,
        op: impl FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error>,
    ) -> Result<T> {
        let mut guard = lock_or_recover(&self.handle, "System clipboard");
        if guard.is_none() {
            *guard = Some(arboard::Clipboard::new()?);
        }
        match guard.as_mut() {
            Some(clipboard) => Ok(op(clipboard)?),
            None => anyhow::bail!("clipboard unavailable"),
        }
    }
}

#[cfg(feature = "system-clipboard")]
impl ClipboardBackend for SystemClipboard {
    fn read(&self) -> String {
        match self.with_handle(|c| c.get_text()) {
            Ok(text) => text,
            Err(err) => {
                tracing::trace!("clipboard read failed: {:#}", err);
                String::new()
            }
        }
    }

    fn write(&self, text: &str) -> Result<()> {
        self.with_handle(|c| c.set_text(text.to_string()))
    }
}

/// Platform clipboard when compiled in, otherwise an in-memory one.
pub fn default_backend() -> std::sync::Arc<dyn ClipboardBackend> {
    #[cfg(feature = "system-clipboard")]
    {
        std::sync::Arc::new(SystemClipboard::new())
    }
    #[cfg(not(feature = "system-clipboard"))]
    {
        std::sync::Arc::new(MemoryClipboard::default())
    }
}
