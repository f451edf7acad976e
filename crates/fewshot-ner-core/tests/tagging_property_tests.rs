//! Property tests for the tag / extract round trip and the selector.

use fewshot_ner_core::{extract, select, tag, Criterion, Example, Markers};
use proptest::prelude::*;

const TARGET: u32 = 1;

fn sentence() -> impl Strategy<Value = (Vec<String>, Vec<u32>)> {
    prop::collection::vec(("[A-Za-zéà]{1,6}", 0u32..3), 0..20)
        .prop_map(|pairs| pairs.into_iter().unzip())
}

fn pool() -> impl Strategy<Value = Vec<Example>> {
    prop::collection::vec(sentence(), 0..12).prop_map(|sentences| {
        sentences
            .into_iter()
            .enumerate()
            .map(|(i, (tokens, labels))| Example::new(i.to_string(), tokens, labels).unwrap())
            .collect()
    })
}

fn criterion() -> impl Strategy<Value = Criterion> {
    prop_oneof![
        Just(Criterion::MostOccurrences),
        Just(Criterion::MostCommonTokens),
        Just(Criterion::ClosestTfIdf),
    ]
}

proptest! {
    #[test]
    fn tag_then_extract_recovers_runs((tokens, labels) in sentence()) {
        let markers = Markers::default();
        let tagged = tag(&tokens, &labels, TARGET, &markers).unwrap();
        let example = Example::new("p", tokens, labels).unwrap();

        prop_assert_eq!(extract(&tagged, &markers).unwrap(), example.mentions(TARGET));
    }

    #[test]
    fn markers_are_balanced((tokens, labels) in sentence()) {
        let markers = Markers::new("<<", ">>");
        let tagged = tag(&tokens, &labels, TARGET, &markers).unwrap();
        let runs = Example::new("p", tokens, labels).unwrap().mentions(TARGET).len();

        prop_assert_eq!(tagged.matches("<<").count(), runs);
        prop_assert_eq!(tagged.matches(">>").count(), runs);
    }

    #[test]
    fn untagged_text_is_preserved((tokens, labels) in sentence()) {
        let markers = Markers::default();
        let tagged = tag(&tokens, &labels, TARGET, &markers).unwrap();
        let stripped = tagged.replace("@@", "").replace("##", "");

        prop_assert_eq!(stripped, tokens.join(" "));
    }

    #[test]
    fn selection_is_capped_and_deterministic(
        pool in pool(),
        (tokens, labels) in sentence(),
        n in 0usize..16,
        criterion in criterion(),
    ) {
        let query = Example::new("q", tokens, labels).unwrap();
        let first = select(&pool, &query, TARGET, n, criterion);
        let second = select(&pool, &query, TARGET, n, criterion);

        prop_assert_eq!(first.len(), n.min(pool.len()));
        prop_assert_eq!(&first, &second);

        let mut unique = first.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn selection_returns_best_scores_last(
        pool in pool(),
        (tokens, labels) in sentence(),
        n in 1usize..16,
    ) {
        let query = Example::new("q", tokens, labels).unwrap();
        let picked = select(&pool, &query, TARGET, n, Criterion::MostOccurrences);
        let counts: Vec<usize> = picked.iter().map(|&i| pool[i].count_label(TARGET)).collect();

        prop_assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        if let Some(&lowest_picked) = counts.first() {
            let left_out_max = (0..pool.len())
                .filter(|i| !picked.contains(i))
                .map(|i| pool[i].count_label(TARGET))
                .max();
            if let Some(max) = left_out_max {
                prop_assert!(max <= lowest_picked);
            }
        }
    }
}

#[test]
fn whole_sequence_is_one_mention() {
    let tokens = vec!["Nueva".to_string(), "York".to_string()];
    let tagged = tag(&tokens, &[1, 1], 1, &Markers::default()).unwrap();
    assert_eq!(tagged, "@@Nueva York##");
    assert_eq!(extract(&tagged, &Markers::default()).unwrap(), vec!["Nueva York"]);
}
