use crate::model::Location;

/// Ordered, de-duplicated list of saved locations. The first entry is the
/// primary one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationBook {
    entries: Vec<Location>,
}

impl LocationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a seed list, dropping later duplicates.
    pub fn from_locations(locations: impl IntoIterator<Item = Location>) -> Self {
        let mut book = Self::new();
        for location in locations {
            book.add(location);
        }
        book
    }

    /// Append `location` unless one with the same display name exists.
    pub fn add(&mut self, location: Location) -> bool {
        if self.contains(&location) {
            tracing::debug!(location = %location, "location already saved");
            return false;
        }

        tracing::debug!(location = %location, "location added");
        self.entries.push(location);
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Location> {
        if index >= self.entries.len() {
            return None;
        }
        Some(self.entries.remove(index))
    }

    /// Move the entry at `from` so that it ends up at index `to`.
    pub fn move_to(&mut self, from: usize, to: usize) -> bool {
        let len = self.entries.len();
        if from >= len || to >= len {
            return false;
        }

        let location = self.entries.remove(from);
        self.entries.insert(to, location);
        true
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.entries.iter().any(|l| l.same_place(location))
    }

    pub fn primary(&self) -> Option<&Location> {
        self.entries.first()
    }

    pub fn get(&self, index: usize) -> Option<&Location> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
