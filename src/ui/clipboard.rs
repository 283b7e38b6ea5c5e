//! System clipboard access for copy and paste.

/// Lazily opened system clipboard. Failures are logged and otherwise
/// ignored; a headless host simply has no clipboard.
#[derive(Default)]
pub struct Clipboard {
    inner: Option<arboard::Clipboard>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Option<&mut arboard::Clipboard> {
        if self.inner.is_none() {
            match arboard::Clipboard::new() {
                Ok(clipboard) => self.inner = Some(clipboard),
                Err(e) => {
                    tracing::warn!("Clipboard unavailable: {}", e);
                    return None;
                }
            }
        }
        self.inner.as_mut()
    }

    /// Put text on the clipboard. Returns false if that failed.
    pub fn copy(&mut self, text: &str) -> bool {
        let Some(clipboard) = self.handle() else {
            return false;
        };
        match clipboard.set_text(text.to_string()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to copy to clipboard: {}", e);
                false
            }
        }
    }

    /// Clipboard text, if there is any
    pub fn paste(&mut self) -> Option<String> {
        let clipboard = self.handle()?;
        match clipboard.get_text() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("Nothing to paste: {}", e);
                None
            }
        }
    }
}
