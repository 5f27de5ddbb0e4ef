use url::Url;

#[must_use]
pub fn comic_path(id: u32) -> String {
    format!("/{id}")
}

/// Extracts the comic id embedded in an address (`/37`, `https://host/37/`).
///
/// Returns `None` when the address names no comic, which means "latest".
#[must_use]
pub fn parse_comic_id(address: &str) -> Option<i64> {
    let address = address.trim();
    let path = match Url::parse(address) {
        Ok(url) => url.path().to_owned(),
        Err(_) => address
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_owned(),
    };

    path.split('/')
        .find(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|segment| segment.parse::<i64>().ok())
}

/// Back/forward stack of visited addresses, like a browser tab's history.
#[derive(Debug, Clone, Default)]
pub struct AddressHistory {
    entries: Vec<String>,
    cursor: usize,
}

impl AddressHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            cursor: 0,
        }
    }

    #[must_use]
    pub fn current(&self) -> &str {
        self.entries.get(self.cursor).map_or("/", String::as_str)
    }

    /// Records a new address, dropping any forward entries. Re-pushing the
    /// current address is a no-op.
    pub fn push(&mut self, address: impl Into<String>) {
        let address = address.into();
        if self.entries.is_empty() {
            self.entries.push(address);
            self.cursor = 0;
            return;
        }
        if self.current() == address {
            return;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(address);
        self.cursor = self.entries.len() - 1;
    }

    /// Rewrites the current entry in place, keeping back and forward entries.
    pub fn replace(&mut self, address: impl Into<String>) {
        match self.entries.get_mut(self.cursor) {
            Some(entry) => *entry = address.into(),
            None => self.push(address),
        }
    }

    pub fn back(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&str> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }
}
