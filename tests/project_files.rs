use blockstage_core::ids::SequentialIds;
use blockstage_core::model::BlockKind;
use blockstage_core::project::{Project, ProjectError};
use blockstage_core::runtime::Runtime;
use blockstage_core::trace::TraceRecorder;
use std::fs;

const COLLIDING_PAIR: &str = r##"{
    "sprites": [
        {
            "id": "left",
            "name": "Left",
            "color": "#ff6b6b",
            "x": 0, "y": 0,
            "scripts": [{
                "id": "left-main",
                "blocks": [
                    { "id": "l1", "type": "repeat", "params": { "times": "2" },
                      "children": [ { "id": "l2", "type": "move", "params": { "steps": 10 } } ] },
                    { "id": "l3", "type": "say", "params": { "text": "done", "seconds": 0.5 } }
                ]
            }]
        },
        {
            "id": "right",
            "name": "Right",
            "color": "#4ecdc4",
            "x": 112, "y": 0,
            "rotation": 180,
            "scripts": [{
                "blocks": [
                    { "id": "r1", "type": "move", "params": { "steps": 20 } },
                    { "id": "r2", "type": "turn", "params": { "degrees": 45 } }
                ]
            }]
        }
    ]
}"##;

#[test]
fn project_file_loads_and_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("stage.json");
    fs::write(&path, COLLIDING_PAIR).expect("write project");

    let mut ids = SequentialIds::new("gen");
    let mut project = blockstage_core::load_project(&path, &mut ids).expect("load project");
    assert_eq!(project.sprites.len(), 2);
    assert_eq!(project.sprites[0].scripts[0].blocks[0].kind, BlockKind::Repeat);
    assert!(project.sprites[1].scripts[0].id.starts_with("gen-"));

    let mut recorder = TraceRecorder::new();
    let report = project.run(&Runtime::default(), &mut recorder);

    assert_eq!(
        report.collisions,
        vec![("Left".to_string(), "Right".to_string())]
    );
    assert!(!report.stopped);
    let summary = blockstage_core::render_summary(&project, &report);
    assert!(summary.contains("collision: Left <-> Right"));
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.json");
    let err = blockstage_core::load_project(&path, &mut SequentialIds::default())
        .expect_err("file does not exist");
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn malformed_file_surfaces_project_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").expect("write project");

    let err = Project::load_file(&path, &mut SequentialIds::default()).expect_err("invalid json");
    assert!(matches!(err, ProjectError::Json(_)));
}
