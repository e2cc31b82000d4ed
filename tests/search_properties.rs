//! Property tests: search results agree with a brute-force filter over every
//! stored translation, and pages tile the full result list.

use proptest::prelude::*;
use std::collections::BTreeSet;

use translation_store::{SearchParams, StoreError, Translation, TranslationInput, TranslationService};

const LOCALES: [&str; 3] = ["en", "fr", "de"];
const TAGS: [&str; 3] = ["x", "y", "z"];

fn record() -> impl Strategy<Value = (String, usize, String, Vec<usize>)> {
    (
        "[a-cA-C.]{1,3}",
        0..LOCALES.len(),
        "[a-cA-C ]{0,3}[a-c]",
        prop::collection::vec(0..TAGS.len(), 0..3),
    )
}

fn filters() -> impl Strategy<Value = (Option<String>, Option<String>, Option<usize>, Vec<usize>)> {
    (
        prop::option::of("[a-cA-C]{0,2}"),
        prop::option::of("[a-cA-C]{0,2}"),
        prop::option::of(0..LOCALES.len()),
        prop::collection::vec(0..TAGS.len(), 0..2),
    )
}

fn expected(stored: &[Translation], params: &SearchParams) -> Vec<i64> {
    let wanted_tags: BTreeSet<&str> = params.tags.iter().map(String::as_str).collect();
    let contains = |haystack: &str, needle: &Option<String>| match needle {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    };

    let mut hits: Vec<&Translation> = stored
        .iter()
        .filter(|t| {
            if !wanted_tags.is_empty() {
                return t.tags.iter().any(|tag| wanted_tags.contains(tag.name.as_str()));
            }
            let locale_ok = match params.locale.as_deref() {
                Some(l) => t.locale == l,
                None => true,
            };
            contains(&t.key, &params.key) && contains(&t.content, &params.content) && locale_ok
        })
        .collect();
    hits.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));
    hits.into_iter().map(|t| t.id).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn search_matches_brute_force(
        records in prop::collection::vec(record(), 0..25),
        (key, content, locale, tags) in filters(),
        page_size in 1u32..7,
    ) {
        tokio_test::block_on(async {
            let service = TranslationService::in_memory();
            let mut stored = Vec::new();
            for (key, locale, content, tag_idx) in &records {
                let input = TranslationInput::new(
                    key,
                    LOCALES[*locale],
                    content,
                    tag_idx.iter().map(|i| TAGS[*i]),
                );
                match service.create_translation(&input).await {
                    Ok(t) => stored.push(t),
                    Err(StoreError::DuplicateKey { .. }) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }

            let params = SearchParams {
                key: key.filter(|k| !k.is_empty()),
                content: content.filter(|c| !c.is_empty()),
                locale: locale.map(|l| LOCALES[l].to_string()),
                tags: tags.iter().map(|i| TAGS[*i].to_string()).collect(),
                page: 0,
                page_size,
            };
            let want = expected(&stored, &params);

            let mut got = Vec::new();
            let mut page = 0;
            loop {
                let result = service
                    .search_translations(SearchParams { page, ..params.clone() })
                    .await
                    .unwrap();
                assert_eq!(result.total_count, want.len() as u64);
                assert!(result.items.len() <= page_size as usize);
                if result.items.is_empty() {
                    break;
                }
                got.extend(result.items.iter().map(|t| t.id));
                page += 1;
            }

            assert_eq!(got, want);
        });
    }

    #[test]
    fn export_holds_one_entry_per_key(records in prop::collection::vec(record(), 0..25)) {
        tokio_test::block_on(async {
            let service = TranslationService::in_memory();
            let mut keys = BTreeSet::new();
            for (key, locale, content, _) in &records {
                let input = TranslationInput::new(key, LOCALES[*locale], content, Vec::<String>::new());
                if service.create_translation(&input).await.is_ok() && *locale == 0 {
                    keys.insert(key.clone());
                }
            }

            let export = service.export_locale("en").await.unwrap();
            assert_eq!(export.keys().cloned().collect::<BTreeSet<_>>(), keys);
        });
    }
}
