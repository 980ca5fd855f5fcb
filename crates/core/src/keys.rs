use sha2::{Digest, Sha256};
use std::fmt;

/// Content-addressed identifier shared by every chunk of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_text(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn chunk_key(document_id: &DocumentId, sequence_index: u64) -> String {
    format!("{document_id}_{sequence_index}")
}

#[cfg(test)]
mod tests {
    use super::{chunk_key, DocumentId};

    #[test]
    fn document_id_is_a_stable_sha256_digest() {
        let id = DocumentId::from_text("abc");
        assert_eq!(
            id.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(id, DocumentId::from_text("abc"));
    }

    #[test]
    fn different_text_yields_different_ids() {
        assert_ne!(DocumentId::from_text("page one"), DocumentId::from_text("page two"));
    }

    #[test]
    fn chunk_key_joins_id_and_index() {
        let id = DocumentId::from_text("");
        assert_eq!(
            chunk_key(&id, 7),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855_7"
        );
    }
}
