// Integration tests for XML save/load round trips

use std::fs;
use std::rc::Rc;

use datatree::{
    BinaryParameter, BoolParameter, ChoiceParameter, Container, FloatParameter, IntParameter,
    Node, StringParameter,
};

fn build_tree() -> Rc<Container> {
    let root = Container::new(None, "synth", "Synth").unwrap();
    StringParameter::new(&root, "name", "Name", "init").unwrap();
    BoolParameter::new(&root, "enabled", "Enabled", true).unwrap();
    FloatParameter::new(&root, "volume", "Volume", 0.0, "dB", 5).unwrap();
    BinaryParameter::new(&root, "patch", "Patch", Some(Vec::new())).unwrap();
    ChoiceParameter::new(
        &root,
        "mode",
        "Mode",
        vec![
            (3, "drei".to_string()),
            (5, "fünf".to_string()),
            (8, "acht".to_string()),
        ],
        5,
    )
    .unwrap();

    let filter = Container::new(Some(&root), "filter", "Filter").unwrap();
    IntParameter::new(&filter, "cutoff", "Cutoff", 1000).unwrap();

    Container::new_dynamic(Some(&root), "channels", "Channels", |parent| {
        let item = Container::new_item(parent, "channel", "Channel")?;
        IntParameter::new(&item, "level", "Level", 0)?;
        Ok(item)
    })
    .unwrap();

    root
}

fn patch_param(root: &Rc<Container>) -> Rc<BinaryParameter> {
    root.param("patch")
        .unwrap()
        .as_any_rc()
        .downcast::<BinaryParameter>()
        .unwrap()
}

#[test]
fn save_then_load_restores_every_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synth.xml");

    let tree = build_tree();
    tree.param("name").unwrap().set_as_string("Lead").unwrap();
    tree.param("enabled").unwrap().set_as_string("false").unwrap();
    tree.param("volume").unwrap().set_as_string("-7.25").unwrap();
    tree.param("mode").unwrap().set_as_string("acht").unwrap();
    patch_param(&tree)
        .set_value(Some(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]))
        .unwrap();
    tree.param_by_path("filter.cutoff")
        .unwrap()
        .set_as_string("250")
        .unwrap();
    let channels = tree.child("channels").unwrap();
    channels.add().unwrap().param("level").unwrap().set_as_string("11").unwrap();
    channels.add().unwrap().param("level").unwrap().set_as_string("22").unwrap();

    tree.save_to_file(&path, true).unwrap();
    assert!(!tree.is_modified());

    let loaded = build_tree();
    loaded.load_from_file(&path, true).unwrap();

    assert_eq!(loaded.param("name").unwrap().as_string(), "Lead");
    assert_eq!(loaded.param("enabled").unwrap().as_string(), "false");
    assert_eq!(loaded.param("volume").unwrap().as_string(), "-7.25");
    assert_eq!(loaded.param("mode").unwrap().as_string(), "acht");
    assert_eq!(
        patch_param(&loaded).value(),
        Some(vec![1, 2, 3, 4, 5, 6, 7, 8, 9])
    );
    assert_eq!(
        loaded.param_by_path("filter.cutoff").unwrap().as_string(),
        "250"
    );

    let channels = loaded.child("channels").unwrap();
    assert_eq!(channels.children().len(), 2);
    assert_eq!(
        loaded
            .param_by_path("channels.channel[0].level")
            .unwrap()
            .as_string(),
        "11"
    );
    assert_eq!(
        loaded
            .param_by_path("channels.channel[1].level")
            .unwrap()
            .as_string(),
        "22"
    );

    // loading is never recorded on the undo stack
    assert!(loaded.undo_stack().is_empty());
    assert!(!loaded.is_modified());
}

#[test]
fn choice_is_persisted_as_value_with_label_attribute() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synth.xml");

    let tree = build_tree();
    tree.param("mode").unwrap().set_as_string("acht").unwrap();
    tree.save_to_file(&path, false).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains(r#"val="8""#));
    assert!(text.contains(r#"valStr="acht""#));
    assert!(text.contains(r#"unit="dB""#));
}

#[test]
fn float_rendering_is_stable_across_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synth.xml");

    let tree = build_tree();
    tree.param("volume").unwrap().set_as_string("55.07600").unwrap();
    assert_eq!(tree.param("volume").unwrap().as_string(), "55.076");

    tree.save_to_file(&path, false).unwrap();
    let first = fs::read_to_string(&path).unwrap();
    assert!(first.contains(r#"val="55.076""#));

    let loaded = build_tree();
    loaded.load_from_file(&path, true).unwrap();
    loaded.save_to_file(&path, false).unwrap();
    let second = fs::read_to_string(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn absent_elements_leave_current_values_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.xml");
    fs::write(
        &path,
        r#"<?xml version="1.0" encoding="utf-8"?>
           <Cnt id="synth" name="Synth">
             <Pm id="name" name="Name" val="OnlyName"/>
           </Cnt>"#,
    )
    .unwrap();

    let tree = build_tree();
    tree.load_from_file(&path, true).unwrap();

    assert_eq!(tree.param("name").unwrap().as_string(), "OnlyName");
    assert_eq!(tree.param("enabled").unwrap().as_string(), "true");
    assert_eq!(
        tree.param_by_path("filter.cutoff").unwrap().as_string(),
        "1000"
    );
    assert!(tree.child("channels").unwrap().children().is_empty());
    assert!(!tree.is_modified());
}

#[test]
fn malformed_documents_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.xml");
    fs::write(&path, "<Cnt id=\"synth\">").unwrap();

    let tree = build_tree();
    assert!(tree.load_from_file(&path, false).is_err());
    assert!(tree
        .load_from_file(dir.path().join("missing.xml"), false)
        .is_err());
}
