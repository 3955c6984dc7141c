//! The logical address -> byte memory image, and the paging/gap-splitting
//! utilities drivers and file formats use to chunk it up.

use std::collections::BTreeMap;

/// A sparse address -> byte image. Absent keys mean "unknown/unprogrammed".
///
/// `BTreeMap` already iterates in ascending key order, which is the
/// ordering every caller here needs, so no explicit sort step is required.
pub type Mem = BTreeMap<u32, u8>;

/// Groups `mem` by `address / page_size`, visited in ascending page order.
pub fn split_to_pages(mem: &Mem, page_size: u32) -> Vec<Mem> {
    let mut pages: Vec<Mem> = Vec::new();
    let mut current_page: Option<u32> = None;

    for (&addr, &val) in mem.iter() {
        let page = addr / page_size;
        if current_page != Some(page) {
            pages.push(Mem::new());
            current_page = Some(page);
        }
        pages.last_mut().unwrap().insert(addr, val);
    }
    pages
}

/// Splits `mem` into maximal runs of consecutive addresses.
pub fn split_on_gaps(mem: &Mem) -> Vec<Mem> {
    let mut runs: Vec<Mem> = Vec::new();
    let mut last: Option<u32> = None;

    for (&addr, &val) in mem.iter() {
        let starts_new_run = match last {
            Some(l) => addr != l + 1,
            None => true,
        };
        if starts_new_run {
            runs.push(Mem::new());
        }
        runs.last_mut().unwrap().insert(addr, val);
        last = Some(addr);
    }
    runs
}

#[cfg(test)]
mod test {
    use super::*;

    fn mem_of(pairs: &[(u32, u8)]) -> Mem {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_split_to_pages() {
        let empty = Mem::new();
        assert!(split_to_pages(&empty, 8).is_empty());

        let d = mem_of(&[(0, 0), (1, 1), (2, 2), (5, 5)]);
        assert_eq!(
            split_to_pages(&d, 2),
            vec![mem_of(&[(0, 0), (1, 1)]), mem_of(&[(2, 2)]), mem_of(&[(5, 5)])]
        );
        assert_eq!(
            split_to_pages(&d, 4),
            vec![mem_of(&[(0, 0), (1, 1), (2, 2)]), mem_of(&[(5, 5)])]
        );
        assert_eq!(split_to_pages(&d, 8), vec![d.clone()]);
    }

    #[test]
    fn test_split_on_gaps() {
        let empty = Mem::new();
        assert!(split_on_gaps(&empty).is_empty());

        let d = mem_of(&[(0, 0), (1, 1), (2, 2), (5, 5)]);
        assert_eq!(
            split_on_gaps(&d),
            vec![mem_of(&[(0, 0), (1, 1), (2, 2)]), mem_of(&[(5, 5)])]
        );
    }
}
