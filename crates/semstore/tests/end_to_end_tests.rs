mod common;

use std::fs;
use std::path::Path;

use common::init_tracing;
use semstore::{ChunkPayload, Modality, SlotRange, Store, StoreError, StoreSettings};
use tempfile::TempDir;

fn settings() -> StoreSettings {
    StoreSettings { embedding_dim: 48, ..StoreSettings::default() }
}

fn open(dir: &Path) -> Store {
    init_tracing();
    let mut store = Store::new(settings()).unwrap();
    store.connect(dir.join("library.db").to_str().unwrap()).unwrap();
    store
}

fn write_image(path: &Path, seed: u32) {
    fs::write(path, (0..2048u32).map(|i| (i.wrapping_mul(seed) % 251) as u8).collect::<Vec<u8>>()).unwrap();
}

#[test]
fn text_round_trip_survives_reconnect() {
    let tmp = TempDir::new().unwrap();
    let doc = tmp.path().join("water.txt");
    fs::write(&doc, "boil water for one minute\n\nstore grain in sealed buckets").unwrap();
    let doc_locator = doc.to_str().unwrap();

    let id = {
        let mut store = open(tmp.path());
        let id = store.insert(doc_locator).unwrap();
        assert_eq!(store.get(&id).unwrap().slot_range, SlotRange::new(0, 2));

        let results = store.search("boil water for one minute", 2, &["text"]).unwrap();
        assert_eq!(results.texts.len(), 1);
        assert_eq!(results.texts[0].chunks[0], ChunkPayload::text("boil water for one minute"));
        assert_eq!(results.texts[0].chunks.len(), 2);
        assert!(results.texts[0].distances[0] <= results.texts[0].distances[1]);
        id
    };

    let store = open(tmp.path());
    let record = store.get(&id).unwrap();
    assert_eq!(record.source, doc_locator);
    assert_eq!(record.modality, Modality::Text);
    let results = store.search("sealed buckets", 1, &["text"]).unwrap();
    assert_eq!(results.texts[0].file_id, id);
    assert!(tmp.path().join("library_text.index").exists());
    assert!(tmp.path().join("library_chunks.db").exists());
}

#[test]
fn deleted_files_drop_out_of_search_and_compaction_reclaims_them() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.txt");
    let b = tmp.path().join("b.txt");
    fs::write(&a, "seed saving for tomatoes").unwrap();
    fs::write(&b, "rainwater collection barrels").unwrap();

    let mut store = open(tmp.path());
    let a_id = store.insert(a.to_str().unwrap()).unwrap();
    let b_id = store.insert(b.to_str().unwrap()).unwrap();

    store.delete(&a_id).unwrap();
    assert!(matches!(store.get(&a_id), Err(StoreError::NotFound(_))));
    let results = store.search("seed saving for tomatoes", 5, &["text"]).unwrap();
    let ids: Vec<&str> = results.texts.iter().map(|m| m.file_id.as_str()).collect();
    assert_eq!(ids, vec![b_id.as_str()]);

    let report = store.compact().unwrap();
    assert_eq!(report.removed.get(&Modality::Text), Some(&1));
    drop(store);

    let store = open(tmp.path());
    assert!(store.deleted_slots(Modality::Text).unwrap().is_empty());
    assert_eq!(store.record_count().unwrap(), 1);
    assert_eq!(store.search("rainwater", 5, &["text"]).unwrap().texts.len(), 1);
}

#[test]
fn directory_ingest_reports_each_file() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir_all(data.join("nested")).unwrap();
    fs::write(data.join("guide.txt"), "compost needs air and moisture").unwrap();
    fs::write(data.join("empty.txt"), "   ").unwrap();
    fs::write(data.join("notes.md"), "markdown is not ingested").unwrap();
    write_image(&data.join("nested/goat.png"), 31);

    let mut store = open(tmp.path());
    let outcomes = store.insert_dir(&data).unwrap();
    let names: Vec<String> =
        outcomes.iter().map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["empty.txt", "guide.txt", "goat.png"]);
    assert!(outcomes[0].1.is_err(), "blank file has nothing to embed");
    assert!(outcomes[1].1.is_ok() && outcomes[2].1.is_ok());
    assert_eq!(store.record_count().unwrap(), 2);
    assert_eq!(store.records(Some(Modality::Image)).unwrap().len(), 1);

    assert!(matches!(store.insert_dir(&data.join("guide.txt")), Err(StoreError::InvalidArgument(_))));
}

#[test]
fn image_queries_find_the_same_picture() {
    let tmp = TempDir::new().unwrap();
    let goat = tmp.path().join("goat.jpg");
    let hen = tmp.path().join("hen.png");
    write_image(&goat, 7);
    write_image(&hen, 13);

    let mut store = open(tmp.path());
    let goat_id = store.insert(goat.to_str().unwrap()).unwrap();
    store.insert(hen.to_str().unwrap()).unwrap();

    let matches = store.search_image(goat.to_str().unwrap(), 2).unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].file_id, goat_id);
    assert_eq!(matches[0].chunks, vec![ChunkPayload::image(goat.to_str().unwrap())]);
    assert!(matches[0].distances[0] < 1e-4);

    let captions = store.search("goat", 1, &["image"]).unwrap();
    assert_eq!(captions.images.len(), 1);
}

#[test]
fn audio_is_searched_through_its_transcript() {
    let tmp = TempDir::new().unwrap();
    let clip = tmp.path().join("broadcast.wav");
    fs::write(&clip, b"RIFF....WAVE").unwrap();
    fs::write(tmp.path().join("broadcast.wav.transcript"), "storm warning tonight\n\nroads are closed").unwrap();

    let mut store = open(tmp.path());
    let id = store.insert(clip.to_str().unwrap()).unwrap();
    assert_eq!(store.get(&id).unwrap().slot_range, SlotRange::new(0, 2));

    let results = store.search("roads are closed", 1, &["audio"]).unwrap();
    assert_eq!(results.audios[0].file_id, id);
    assert_eq!(results.audios[0].chunks, vec![ChunkPayload::audio(1, "roads are closed")]);
}
