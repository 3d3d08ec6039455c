use super::engine::SharedHandle;
use super::item::ArchiveItem;
use crate::utils::error::{IceError, Result};

/// 열린 핸들 위의 읽기 전용 엔트리 목록
///
/// 개수는 열 때 고정되고, 아이템은 요청할 때마다 새로 만든다.
#[derive(Clone)]
pub struct ArchiveList {
    handle: SharedHandle,
    count: usize,
}

impl ArchiveList {
    pub fn new(handle: SharedHandle, count: usize) -> Self {
        Self { handle, count }
    }

    /// 핸들에서 개수를 직접 읽어 만든다.
    pub fn from_handle(handle: SharedHandle) -> Result<Self> {
        let count = handle.with(|h| Ok(h.item_count()))?;
        Ok(Self::new(handle, count))
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> Result<ArchiveItem> {
        if index >= self.count {
            return Err(IceError::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        Ok(ArchiveItem::new(self.handle.clone(), index))
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            next: 0,
        }
    }
}

pub struct Iter<'a> {
    list: &'a ArchiveList,
    next: usize,
}

impl Iterator for Iter<'_> {
    type Item = ArchiveItem;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.list.count {
            return None;
        }
        let item = ArchiveItem::new(self.list.handle.clone(), self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.list.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a ArchiveList {
    type Item = ArchiveItem;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::system::archive::fixtures;
    use crate::system::archive::{ArchiveReader, StaticPassword};
    use crate::utils::error::IceError;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn open_sample(dir: &std::path::Path) -> ArchiveReader {
        let archive = dir.join("sample.zip");
        fixtures::write_zip(
            &archive,
            &[
                ("docs/", b"".as_slice()),
                ("docs/readme.txt", b"read me"),
                ("image.png", b"\x89PNG"),
            ],
            None,
        );
        ArchiveReader::open(&archive, Arc::new(StaticPassword(None))).expect("open sample")
    }

    #[test]
    fn test_get_is_stable_across_calls() {
        let temp = tempdir().expect("create tempdir");
        let reader = open_sample(temp.path());
        let items = reader.items().expect("items");
        assert_eq!(items.len(), 3);
        for i in 0..items.len() {
            let first = items.get(i).expect("first get").info().expect("first info");
            let second = items.get(i).expect("second get").info().expect("second info");
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_get_out_of_range_fails() {
        let temp = tempdir().expect("create tempdir");
        let reader = open_sample(temp.path());
        let items = reader.items().expect("items");
        assert!(matches!(
            items.get(3),
            Err(IceError::IndexOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_iteration_matches_indexed_access_and_restarts() {
        let temp = tempdir().expect("create tempdir");
        let reader = open_sample(temp.path());
        let items = reader.items().expect("items");

        let iter = items.iter();
        assert_eq!(iter.len(), 3);
        let names: Vec<String> = iter.map(|item| item.full_name().expect("name")).collect();
        assert_eq!(names, vec!["docs", "docs/readme.txt", "image.png"]);

        let again: Vec<usize> = (&items).into_iter().map(|item| item.index()).collect();
        assert_eq!(again, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_archive_yields_no_items() {
        let temp = tempdir().expect("create tempdir");
        let archive = temp.path().join("empty.zip");
        fixtures::write_zip(&archive, &[], None);
        let reader =
            ArchiveReader::open(&archive, Arc::new(StaticPassword(None))).expect("open empty");
        let items = reader.items().expect("items");
        assert!(items.is_empty());
        assert_eq!(items.iter().count(), 0);
    }
}
