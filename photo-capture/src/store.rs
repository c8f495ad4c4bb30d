use crate::models::PhotoRecord;
use crate::policy::category_matches;

/// Ordered collection of photo records for the current session
///
/// The store is the only writable owner of the records. An emptied store is
/// still a store: it lists nothing and persists as an empty array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaStore {
    photos: Vec<PhotoRecord>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(photos: Vec<PhotoRecord>) -> Self {
        Self { photos }
    }

    /// All records in insertion order
    pub fn list(&self) -> &[PhotoRecord] {
        &self.photos
    }

    pub fn add(&mut self, record: PhotoRecord) {
        self.photos.push(record);
    }

    /// Removes a record, returns false if the id is unknown
    pub fn remove(&mut self, id: &str) -> bool {
        match self.photos.iter().position(|p| p.id == id) {
            Some(index) => {
                self.photos.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&PhotoRecord> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn count_by_category(&self, category: &str) -> usize {
        self.photos
            .iter()
            .filter(|p| category_matches(&p.category, category))
            .count()
    }

    /// Records shown for a display filter; `None` shows everything
    pub fn filter_by_category(&self, category: Option<&str>) -> Vec<PhotoRecord> {
        self.photos
            .iter()
            .filter(|p| category.map_or(true, |c| category_matches(&p.category, c)))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Sets a new description and flags the record as modified
    pub fn update_description(&mut self, id: &str, description: &str) -> bool {
        match self.photos.iter_mut().find(|p| p.id == id) {
            Some(photo) => {
                photo.description = description.to_string();
                photo.modified = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_uploaded(&mut self, id: &str) -> bool {
        match self.photos.iter_mut().find(|p| p.id == id) {
            Some(photo) => {
                photo.uploaded = true;
                true
            }
            None => false,
        }
    }
}
