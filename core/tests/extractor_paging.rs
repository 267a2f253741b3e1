//! Keyset paging over the source store.

mod common;

use anonymizer_core::{
    extractor::BatchExtractor,
    records::{RawLoan, RawMember},
};

#[test]
fn pages_cover_every_row_once_in_key_order() {
    let (members, _) = common::population(50, 2);
    let source = common::source_with(&members, &[]);

    let pages: Vec<Vec<RawMember>> = BatchExtractor::<RawMember>::new(&source, 7)
        .collect::<Result<_, _>>()
        .expect("extract");

    let sizes: Vec<usize> = pages.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![7, 7, 7, 7, 7, 7, 7, 1]);
    let ids: Vec<i64> = pages.iter().flatten().map(|m| m.member_id).collect();
    assert_eq!(ids, (1..=50).collect::<Vec<_>>());
}

#[test]
fn exact_multiple_ends_without_an_empty_page() {
    let (members, _) = common::population(21, 2);
    let source = common::source_with(&members, &[]);
    let pages: Vec<_> = BatchExtractor::<RawMember>::new(&source, 7)
        .collect::<Result<Vec<_>, _>>()
        .expect("extract");
    assert_eq!(pages.len(), 3);
    assert!(pages.iter().all(|p| p.len() == 7));
}

#[test]
fn sparse_keys_are_followed() {
    let members: Vec<RawMember> = [3, 10, 11, 400, 9000]
        .into_iter()
        .map(|id| common::member(id, "1970-01-01", "WA", 650))
        .collect();
    let loans: Vec<RawLoan> = vec![common::loan(5, 3), common::loan(50, 400), common::loan(500, 9000)];
    let source = common::source_with(&members, &loans);

    let ids: Vec<i64> = BatchExtractor::<RawMember>::new(&source, 2)
        .flat_map(|page| page.expect("page"))
        .map(|m| m.member_id)
        .collect();
    assert_eq!(ids, vec![3, 10, 11, 400, 9000]);

    let loan_ids: Vec<i64> = BatchExtractor::<RawLoan>::new(&source, 2)
        .flat_map(|page| page.expect("page"))
        .map(|l| l.loan_id)
        .collect();
    assert_eq!(loan_ids, vec![5, 50, 500]);
}

#[test]
fn empty_table_yields_no_pages() {
    let source = common::source_with(&[], &[]);
    assert_eq!(BatchExtractor::<RawMember>::new(&source, 10).count(), 0);
}
