use std::fs;
use std::sync::{Arc, Mutex};

use provkg::answer::{Answer, AnswerGenerator, AnswerProvider, CompletionBackend, TieredGenerator};
use provkg::embedding::LexicalEmbedder;
use provkg::entity::LabeledEntity;
use provkg::error::AnswerError;
use provkg::graph::{read_ntriples, write_ntriples};
use provkg::retrieval::SearchHit;
use provkg::{Config, ContextMode, Pipeline, StaticSource, Vocabulary};

const MAPPING: &str = "new_province,old_province\n\
                       Đà Nẵng,Quang Nam|Da Nang\n\
                       Hà Nội,Ha Tay|Hanoi\n\
                       Cần Thơ,Hau Giang|Atlantis\n";

fn source() -> StaticSource {
    StaticSource::new(vec![
        LabeledEntity::new("http://dbpedia.org/resource/Quang_Nam", "Quang Nam").with_lang("en"),
        LabeledEntity::new("http://dbpedia.org/resource/Da_Nang", "Da Nang").with_lang("en"),
        LabeledEntity::new("http://dbpedia.org/resource/Ha_Tay", "Ha Tay").with_lang("en"),
        LabeledEntity::new("http://dbpedia.org/resource/Hanoi", "Hanoi").with_lang("en"),
        LabeledEntity::new("http://dbpedia.org/resource/Hau_Giang", "Hau Giang").with_lang("en"),
    ])
}

/// Records the context it was given and echoes the fact count.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<usize>>,
}

impl AnswerGenerator for Recorder {
    fn generate(&self, _question: &str, context: &[SearchHit]) -> Answer {
        self.seen.lock().unwrap().push(context.len());
        Answer {
            text: format!("{} facts", context.len()),
            provider: AnswerProvider::Remote,
            degraded: false,
        }
    }
}

struct Down;

impl CompletionBackend for Down {
    fn name(&self) -> &str {
        "down"
    }

    fn complete(&self, _prompt: &str) -> Result<String, AnswerError> {
        Err(AnswerError::Request("connection refused".to_string()))
    }
}

fn pipeline_with(generator: Arc<dyn AnswerGenerator>) -> Pipeline {
    Pipeline::new(
        Vocabulary::default(),
        "http://example.org/vn/entity/",
        Arc::new(LexicalEmbedder::default()),
        generator,
    )
}

#[test]
fn full_run_then_ask_in_both_modes() {
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline_with(recorder.clone());

    let snapshot = pipeline.snapshot(&source()).unwrap();
    let (_merged, report) = pipeline.run(&snapshot, MAPPING.as_bytes()).unwrap();

    assert_eq!(report.parse.pairs, 6);
    assert_eq!(report.merge.pairs_linked, 5);
    assert_eq!(report.merge.pairs_skipped, 1);
    assert_eq!(report.merge.minted_entities, 3);
    assert_eq!(report.facts, 5);

    let top = pipeline
        .ask("What was Hau Giang merged into?", ContextMode::Retrieval { k: 2 })
        .unwrap();
    assert_eq!(top.context.len(), 2);
    assert!(top.context[0].fact.contains("old_label: Hau Giang"));
    assert_eq!(top.answer.text, "2 facts");

    let all = pipeline.ask("List every merger", ContextMode::AllFacts).unwrap();
    assert_eq!(all.context.len(), 5);
    assert_eq!(*recorder.seen.lock().unwrap(), vec![2, 5]);

    let facts = pipeline.facts().unwrap();
    assert!(facts.windows(2).all(|w| (&w[0].new_label, &w[0].old_label) <= (&w[1].new_label, &w[1].old_label)));
}

#[test]
fn failing_remote_degrades_to_fallback() {
    let pipeline = pipeline_with(Arc::new(TieredGenerator::new(Box::new(Down))));
    let snapshot = pipeline.snapshot(&source()).unwrap();
    pipeline.run(&snapshot, MAPPING.as_bytes()).unwrap();

    let response = pipeline.ask("Quang Nam", ContextMode::Retrieval { k: 3 }).unwrap();
    assert!(response.answer.degraded);
    assert_eq!(response.answer.provider, AnswerProvider::Fallback);
    assert!(response.answer.text.contains("Quang Nam"));
}

#[test]
fn reload_from_disk_serves_same_facts() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::from_config(&Config::default()).unwrap();
    let snapshot = pipeline.snapshot(&source()).unwrap();
    let (merged, _) = pipeline.run(&snapshot, MAPPING.as_bytes()).unwrap();

    let path = dir.path().join("merged.nt");
    write_ntriples(&merged, pipeline.vocabulary(), fs::File::create(&path).unwrap()).unwrap();

    let fresh = Pipeline::from_config(&Config::default()).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let reloaded = read_ntriples(text.as_bytes(), fresh.vocabulary()).unwrap();
    assert_eq!(fresh.load_facts(&reloaded).unwrap(), 5);
    assert_eq!(fresh.facts().unwrap(), pipeline.facts().unwrap());
}

#[test]
fn unreadable_mapping_fails_the_run() {
    let pipeline = pipeline_with(Arc::new(Recorder::default()));
    let snapshot = pipeline.snapshot(&source()).unwrap();
    let bad: &[u8] = b"new_province,old_province\n\xff\xfe,x\n";
    assert!(pipeline.run(&snapshot, bad).is_err());
}
