//! Vocabulary construction and example sampling.

use std::fs;
use std::io::Cursor;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempdir::TempDir;

use subvec::dictionary::MAX_LINE_SIZE;
use subvec::features::{CharNgrams, FeatureExtractor};
use subvec::{Args, Corpus, Dictionary, Error, Line, ModelName, EOS};

fn args(model: ModelName) -> Args {
    Args {
        model,
        min_count: 1,
        t: 1e4,
        minn: 2,
        maxn: 3,
        ..Args::default()
    }
}

fn corpus(text: &str) -> Corpus<Cursor<&[u8]>> {
    Corpus::new(Cursor::new(text.as_bytes()))
}

fn build(args: &Args, text: &str) -> Dictionary {
    Dictionary::build(args, &mut corpus(text)).unwrap()
}

fn feature_strings(dict: &Dictionary, word: &str) -> Vec<String> {
    let id = dict.word_id(word).unwrap();
    dict.features_of(id)
        .iter()
        .map(|&f| dict.feature(f).to_string())
        .collect()
}

#[test]
fn small_plain_corpus() {
    let dict = build(&args(ModelName::Plain), "a b a c a b </s>");
    assert_eq!(dict.nwords(), 4);
    assert_eq!(dict.ntokens(), 7);
    assert_eq!(dict.nfeatures(), 0);
    for (word, count) in [("a", 3), ("b", 2), ("c", 1), (EOS, 1)] {
        let id = dict.word_id(word).unwrap();
        assert_eq!(dict.entry(id).count, count, "{word}");
        assert!(dict.features_of(id).is_empty());
    }

    let mut line = Line::new();
    let mut rng = StdRng::seed_from_u64(0);
    let mut input = corpus("a b a c a b </s>");
    let ntokens = dict.get_line(&mut input, &mut line, &mut rng).unwrap();
    assert_eq!(ntokens, 7);

    let expected: Vec<usize> = ["a", "b", "a", "c", "a", "b"]
        .iter()
        .map(|w| dict.word_id(w).unwrap())
        .collect();
    assert_eq!(line.targets, expected);
    let sources: Vec<Vec<usize>> = expected.iter().map(|&id| vec![id]).collect();
    assert_eq!(line.sources, sources);
    assert!(line.types.iter().all(|t| t == &vec![0]));
}

#[test]
fn pruning_drops_rare_words() {
    let args = Args {
        min_count: 2,
        ..args(ModelName::Plain)
    };
    let dict = build(&args, "the cat the dog the cat bird\n");
    let words: Vec<&str> = dict.entries().iter().map(|e| e.word.as_str()).collect();
    assert_eq!(words, vec!["the", "cat"]);
    assert!(dict.entries().iter().all(|e| e.count >= 2));
    assert_eq!(dict.word_id("dog"), None);
    assert_eq!(dict.word_id(EOS), None);
    // Every token still counts toward the total.
    assert_eq!(dict.ntokens(), 8);
}

#[test]
fn targets_mirror_words() {
    for model in [ModelName::Plain, ModelName::Subword] {
        let dict = build(&args(model), "x y z x\ny z\n");
        assert_eq!(dict.nwords(), dict.ntargets());
        for id in 0..dict.nwords() {
            assert_eq!(dict.word(id), dict.target(id));
        }
        assert_eq!(dict.counts(), vec![2, 2, 2, 2]);
    }
}

#[test]
fn empty_vocabulary_is_an_error() {
    let args = Args {
        min_count: 10,
        ..args(ModelName::Subword)
    };
    let result = Dictionary::build(&args, &mut corpus("only a few words\n"));
    assert!(matches!(result, Err(Error::EmptyVocabulary)));
    let result = Dictionary::build(&args, &mut corpus(""));
    assert!(matches!(result, Err(Error::EmptyVocabulary)));
}

#[test]
fn subword_features() {
    let dict = build(&args(ModelName::Subword), "cat hat\n");
    let features = feature_strings(&dict, "cat");
    for expected in ["<c", "ca", "at", "t>", "<ca", "cat", "at>"] {
        assert!(features.iter().any(|f| f == expected), "missing {expected}");
    }
    assert!(!features.iter().any(|f| f == "<" || f == ">"));
    assert!(feature_strings(&dict, EOS).is_empty());

    // Feature ids follow the word ids.
    let id = dict.word_id("cat").unwrap();
    assert!(dict.features_of(id).iter().all(|&f| f >= dict.nwords()));
    // "at" and "at>" are shared between "cat" and "hat".
    let hat = dict.word_id("hat").unwrap();
    let shared = dict.feature_id("at>").unwrap();
    assert!(dict.features_of(id).contains(&shared));
    assert!(dict.features_of(hat).contains(&shared));

    // Sources carry the word id followed by its features.
    let mut line = Line::new();
    let mut rng = StdRng::seed_from_u64(0);
    dict.get_line(&mut corpus("cat\n"), &mut line, &mut rng).unwrap();
    assert_eq!(line.len(), 1);
    assert_eq!(line.sources[0][0], id);
    assert_eq!(&line.sources[0][1..], dict.features_of(id));
    assert_eq!(line.types[0].len(), line.sources[0].len());
}

#[test]
fn every_feature_is_registered() {
    let args = Args {
        minn: 1,
        maxn: 6,
        ..args(ModelName::Subword)
    };
    let text = "aaaa extraordinary banana 猫咪 a\n";
    let dict = build(&args, text);
    let ngrams = CharNgrams { minn: 1, maxn: 6 };
    for id in 0..dict.nwords() {
        let word = dict.word(id);
        let expected = ngrams.extract(word).unwrap();
        let found: Vec<&str> = dict.features_of(id).iter().map(|&f| dict.feature(f)).collect();
        assert_eq!(found, expected, "{word}");
    }
}

#[test]
fn discard_probability_grows_as_words_get_rarer() {
    let args = Args {
        t: 1e-4,
        ..args(ModelName::Plain)
    };
    let text = "a a a a a a a a a a b b b b b c\n";
    let dict = build(&args, text);
    let p = |w: &str| dict.pdiscard(dict.word_id(w).unwrap());
    assert!(p("a") <= p("b"));
    assert!(p("b") <= p("c"));

    let f = 10.0 / dict.ntokens() as f32;
    let expected = (1e-4f32 / f).sqrt() + 1e-4 / f;
    assert!((p("a") - expected).abs() < 1e-6);

    let a = dict.word_id("a").unwrap();
    assert!(dict.discard(a, 0.99));
    assert!(!dict.discard(a, 0.0));
}

#[test]
fn subsampling_skips_but_counts_tokens() {
    let args = Args {
        t: 1e-9,
        ..args(ModelName::Plain)
    };
    let dict = build(&args, "a a a a a a a a\n");
    let mut line = Line::new();
    let mut rng = StdRng::seed_from_u64(5);
    let n = dict
        .get_line(&mut corpus("a a a a a a a a\n"), &mut line, &mut rng)
        .unwrap();
    assert_eq!(n, 9);
    assert!(line.len() < 8);
}

#[test]
fn unknown_words_are_skipped() {
    let dict = build(&args(ModelName::Plain), "a b\n");
    let mut line = Line::new();
    let mut rng = StdRng::seed_from_u64(0);
    let n = dict
        .get_line(&mut corpus("a zzz b\n"), &mut line, &mut rng)
        .unwrap();
    assert_eq!(n, 4);
    assert_eq!(line.len(), 2);
}

#[test]
fn lines_are_capped() {
    let text = "w ".repeat(2000);
    let dict = build(&args(ModelName::Plain), &text);
    let mut line = Line::new();
    let mut rng = StdRng::seed_from_u64(0);
    let n = dict.get_line(&mut corpus(&text), &mut line, &mut rng).unwrap();
    assert_eq!(n, MAX_LINE_SIZE + 1);
    assert_eq!(line.len() as u64, MAX_LINE_SIZE + 1);
}

#[test]
fn get_line_cycles_through_the_corpus() {
    let text = "x y\nz\n";
    let dict = build(&args(ModelName::Plain), text);
    let mut input = corpus(text);
    let mut line = Line::new();
    let mut rng = StdRng::seed_from_u64(0);

    assert_eq!(dict.get_line(&mut input, &mut line, &mut rng).unwrap(), 3);
    assert_eq!(line.len(), 2);
    assert_eq!(dict.get_line(&mut input, &mut line, &mut rng).unwrap(), 2);
    assert_eq!(line.len(), 1);
    // The end of the file shows up as an empty read...
    assert_eq!(dict.get_line(&mut input, &mut line, &mut rng).unwrap(), 0);
    assert!(line.is_empty());
    // ...after which reading starts over.
    assert_eq!(dict.get_line(&mut input, &mut line, &mut rng).unwrap(), 3);
    assert_eq!(line.targets, vec![dict.word_id("x").unwrap(), dict.word_id("y").unwrap()]);
}

#[test]
fn building_is_deterministic() {
    let text = "the quick brown fox jumps over the lazy dog\nthe dog sleeps\n";
    let a = build(&args(ModelName::Subword), text);
    let b = build(&args(ModelName::Subword), text);
    assert_eq!(a.entries(), b.entries());
    assert_eq!(a.nfeatures(), b.nfeatures());
    for id in a.nwords()..a.nwords() + a.nfeatures() {
        assert_eq!(a.feature(id), b.feature(id));
    }
    assert_eq!(a.counts(), b.counts());
}

#[test]
fn subchar_vocabulary() {
    let text = "中_丨 国_囗 国_囗\n江_氵 河_氵\n";
    let dict = build(&args(ModelName::Subchar), text);
    assert_eq!(dict.nwords(), 5);
    assert_eq!(dict.word_id("国_囗"), None);
    assert_eq!(dict.entry(dict.word_id("国").unwrap()).count, 2);
    assert_eq!(feature_strings(&dict, "国"), vec!["<囗>"]);
    assert_eq!(feature_strings(&dict, "江"), vec!["<氵>"]);
    assert_eq!(feature_strings(&dict, EOS), vec![format!("<{EOS}>")]);
    // "<氵>" is shared and weighted by both words.
    assert_eq!(dict.nfeatures(), 4);
}

#[test]
fn separators_that_occur_in_the_sentence_marker() {
    let text = "a/x b/y\nc/z d/w\n";
    for separator in ['/', 's', '<', '>'] {
        let text = text.replace('/', &separator.to_string());
        let args = Args {
            separator,
            ..args(ModelName::Subchar)
        };
        let dict = build(&args, &text);
        assert_eq!(dict.nwords(), 5, "separator {separator:?}");
        assert_eq!(dict.entry(dict.word_id(EOS).unwrap()).count, 2);
        assert_eq!(feature_strings(&dict, EOS), vec![format!("<{EOS}>")]);

        let mut input = corpus(&text);
        let mut line = Line::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(dict.get_line_radical(&mut input, &mut line, &mut rng).unwrap(), 3);
        let ab: Vec<usize> = ["a", "b"].iter().map(|w| dict.word_id(w).unwrap()).collect();
        assert_eq!(line.targets, ab);
        assert_eq!(dict.get_line_radical(&mut input, &mut line, &mut rng).unwrap(), 3);
        assert_eq!(line.len(), 2);
        assert_eq!(dict.untagged_tokens(), 0);
    }
}

#[test]
fn subchar_tokens_need_a_separator_when_building() {
    let result = Dictionary::build(&args(ModelName::Subchar), &mut corpus("中_丨 国\n"));
    match result {
        Err(Error::MissingSeparator { token, separator }) => {
            assert_eq!(token, "国");
            assert_eq!(separator, '_');
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn radical_lines_skip_untagged_tokens() {
    let dict = build(&args(ModelName::Subchar), "中_丨 国_囗\n");
    let mut line = Line::new();
    let mut rng = StdRng::seed_from_u64(0);
    let n = dict
        .get_line_radical(&mut corpus("中_丨 国 国_囗 国_口\n"), &mut line, &mut rng)
        .unwrap();
    assert_eq!(n, 5);
    assert_eq!(line.len(), 3);

    let zhong = dict.word_id("中").unwrap();
    let guo = dict.word_id("国").unwrap();
    assert_eq!(line.targets, vec![zhong, guo, guo]);
    assert_eq!(line.sources[0], vec![zhong, dict.feature_id("<丨>").unwrap()]);
    assert_eq!(line.sources[1], vec![guo, dict.feature_id("<囗>").unwrap()]);
    // "<口>" was never registered, so only the word id is left.
    assert_eq!(line.sources[2], vec![guo]);
    assert_eq!(dict.untagged_tokens(), 1);

    dict.get_line_radical(&mut corpus("a b_c d\n"), &mut line, &mut rng).unwrap();
    assert_eq!(dict.untagged_tokens(), 3);
}

#[test]
fn subradical_uses_the_feature_map() {
    let dir = TempDir::new("subvec").unwrap();
    let map = dir.path().join("radicals.txt");
    fs::write(&map, "江 氵\n河 氵\nbroken-line\n").unwrap();
    let args = Args {
        feature_map: Some(map),
        ..args(ModelName::Subradical)
    };
    let dict = build(&args, "江 河 人\n");
    assert_eq!(feature_strings(&dict, "江"), vec!["<氵>"]);
    assert_eq!(feature_strings(&dict, "河"), vec!["<氵>"]);
    assert_eq!(feature_strings(&dict, "人"), vec!["<unk>"]);
    assert_eq!(dict.nfeatures(), 2);
}

#[test]
fn subradical_without_a_map_is_rejected() {
    let result = Dictionary::build(&args(ModelName::Subradical), &mut corpus("江\n"));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn input_ids_for_unknown_words_use_known_features() {
    let dict = build(&args(ModelName::Subword), "cat\n");
    let cat = dict.word_id("cat").unwrap();
    assert_eq!(dict.input_ids("cat")[0], cat);

    let ids = dict.input_ids("cats");
    assert!(!ids.is_empty());
    assert!(ids.iter().all(|&id| id >= dict.nwords()));
    assert!(ids.contains(&dict.feature_id("<ca").unwrap()));

    assert!(dict.input_ids("zz").is_empty());
}

#[test]
fn save_vocab_writes_counts() {
    let dir = TempDir::new("subvec").unwrap();
    let path = dir.path().join("vocab.txt");
    let dict = build(&args(ModelName::Plain), "b a b\n");
    dict.save_vocab(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), format!("b 2\na 1\n{EOS} 1\n"));
}
