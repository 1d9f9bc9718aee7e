//! Tokenizing, interning, and sub-token feature extraction.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;

use tempdir::TempDir;

use subvec::alphabet::Alphabet;
use subvec::features::{
    bracket, char_ngrams, load_feature_map, CharNgrams, FeatureExtractor, FeatureMap, NoFeatures,
    RadicalTag,
};
use subvec::{Corpus, Error, EOS};

fn tokens(text: &str) -> Vec<String> {
    let mut corpus = Corpus::new(Cursor::new(text.as_bytes()));
    let mut word = String::new();
    let mut out = vec![];
    while corpus.read_word(&mut word).unwrap() {
        out.push(word.clone());
    }
    assert!(corpus.is_eof());
    out
}

#[test]
fn reader_splits_on_whitespace_and_marks_lines() {
    assert_eq!(
        tokens("hello  world\r\n\tfoo\n"),
        vec!["hello", "world", EOS, "foo", EOS]
    );
    assert_eq!(tokens("a\0b\x0bc\x0cd"), vec!["a", "b", "c", "d"]);
    assert_eq!(tokens("\n\nx"), vec![EOS, EOS, "x"]);
    assert!(tokens("").is_empty());
}

#[test]
fn reader_rewinds_only_at_eof() {
    let mut corpus = Corpus::new(Cursor::new("one two".as_bytes()));
    let mut word = String::new();
    assert!(corpus.read_word(&mut word).unwrap());
    assert_eq!(word, "one");

    // Not at EOF yet: reset is a no-op.
    corpus.reset().unwrap();
    assert!(corpus.read_word(&mut word).unwrap());
    assert_eq!(word, "two");
    assert!(!corpus.read_word(&mut word).unwrap());

    corpus.reset().unwrap();
    assert!(!corpus.is_eof());
    assert!(corpus.read_word(&mut word).unwrap());
    assert_eq!(word, "one");
}

#[test]
fn alphabet_counts_and_prunes() {
    let mut a = Alphabet::new(100);
    for w in ["x", "y", "x", "z", "x", "z"] {
        a.add(w);
    }
    assert_eq!(a.len(), 3);
    assert_eq!(a.id("y"), Some(1));
    assert_eq!(a.count(a.id("x").unwrap()), 3);

    a.prune(2);
    assert_eq!(a.len(), 2);
    assert_eq!(a.id("x"), Some(0));
    assert_eq!(a.id("y"), None);
    assert_eq!(a.id("z"), Some(1));
    assert_eq!(a.string(1), "z");
    assert_eq!(a.iter().collect::<Vec<_>>(), vec![("x", 3), ("z", 2)]);
}

#[test]
fn alphabet_respects_capacity() {
    let mut a = Alphabet::new(2);
    assert_eq!(a.add("p"), Some(0));
    assert_eq!(a.add("q"), Some(1));
    assert!(a.is_full());
    assert_eq!(a.add("r"), None);
    // Existing strings can still be counted.
    assert_eq!(a.add_count("p", 4), Some(0));
    assert_eq!(a.count(0), 5);
}

#[test]
fn unbounded_alphabet_never_fills() {
    let mut a = Alphabet::unbounded();
    for i in 0..10_000 {
        assert_eq!(a.add(&i.to_string()), Some(i));
    }
    assert!(!a.is_full());
    assert_eq!(a.len(), 10_000);
}

#[test]
fn ngrams_of_cat() {
    let ngrams = char_ngrams("<cat>", 2, 3);
    assert_eq!(ngrams, vec!["<c", "<ca", "ca", "cat", "at", "at>", "t>"]);
    assert!(!ngrams.contains(&"<"));
    assert!(!ngrams.contains(&">"));
}

#[test]
fn single_character_ngrams_skip_the_markers() {
    let ngrams = char_ngrams("<ab>", 1, 1);
    assert_eq!(ngrams, vec!["a", "b"]);
}

#[test]
fn ngram_count_matches_enumeration() {
    for word in ["a", "to", "cat", "house", "extraordinary"] {
        let bracketed = bracket(word);
        let m = bracketed.len();
        // Every start position yields a 2-gram and a 3-gram while they fit.
        let expected = (m - 1) + (m - 2);
        assert_eq!(char_ngrams(&bracketed, 2, 3).len(), expected, "{word}");
    }
}

#[test]
fn ngrams_respect_utf8_boundaries() {
    let word = bracket("猫咪é");
    for minn in 1..=3 {
        for maxn in minn..=4 {
            for ngram in char_ngrams(&word, minn, maxn) {
                let bytes = ngram.as_bytes();
                assert_ne!(bytes[0] & 0xC0, 0x80, "{ngram:?} starts mid-character");
                let n = ngram.chars().count();
                assert!(n >= minn && n <= maxn);
            }
        }
    }
    assert_eq!(
        char_ngrams("<猫咪>", 2, 3),
        vec!["<猫", "<猫咪", "猫咪", "猫咪>", "咪>"]
    );
}

#[test]
fn extractors() {
    assert!(NoFeatures.extract("cat").unwrap().is_empty());

    let ngrams = CharNgrams { minn: 2, maxn: 3 };
    assert_eq!(ngrams.extract("cat").unwrap().len(), 7);
    assert!(ngrams.extract(EOS).unwrap().is_empty());

    let radical = RadicalTag { separator: '_' };
    assert_eq!(radical.extract("江_氵").unwrap(), vec!["<氵>"]);
    // Only the last separator counts.
    assert_eq!(radical.extract("a_b_c").unwrap(), vec!["<c>"]);
    assert!(matches!(
        radical.extract("江"),
        Err(Error::MissingSeparator { separator: '_', .. })
    ));

    let map = FeatureMap {
        map: HashMap::from([("江".to_string(), "氵工".to_string())]),
        placeholder: "unk".to_string(),
    };
    assert_eq!(map.extract("江").unwrap(), vec!["<氵工>"]);
    assert_eq!(map.extract("河").unwrap(), vec!["<unk>"]);
}

#[test]
fn feature_map_file() {
    let dir = TempDir::new("subvec").unwrap();
    let path = dir.path().join("map.txt");
    fs::write(&path, "江 氵工\n河 氵可\nmalformed\n\n江 水\n").unwrap();

    let map = load_feature_map(&path).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["江"], "水");
    assert_eq!(map["河"], "氵可");
}
