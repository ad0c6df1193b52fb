use pagepaths::tooling::cli::{CliContext, Commands, OutputFormat};
use pagepaths::Locale;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join(".pagepaths")).unwrap();
    fs::write(
        temp.path().join(".pagepaths/config.toml"),
        r#"
[storage]
database_path = "data/site.db"
segments_path = "data/segments"
"#,
    )
    .unwrap();
    temp
}

fn populate(root: &Path) {
    let ctx = CliContext::new(root.to_path_buf(), None).unwrap();
    let tree = ctx.tree();
    tree.insert_node(1, None, "home", 1).unwrap();
    tree.insert_node(10, Some(1), "About", 2).unwrap();
    tree.insert_node(11, Some(10), "Team", 2).unwrap();
    tree.set_locale_name(1, Locale::Named(5), Some("de")).unwrap();
    tree.set_locale_name(10, Locale::Named(5), Some("Unternehmen"))
        .unwrap();
    ctx.execute(&Commands::Rebuild {
        node: None,
        format: OutputFormat::Text,
    })
    .unwrap();
}

fn json(ctx: &CliContext, command: Commands) -> serde_json::Value {
    serde_json::from_str(&ctx.execute(&command).unwrap()).unwrap()
}

#[test]
fn index_survives_reopening_the_workspace() {
    let temp = workspace();
    populate(temp.path());
    assert!(temp.path().join("data/site.db").exists());

    let ctx = CliContext::new(temp.path().to_path_buf(), None).unwrap();
    let paths = json(
        &ctx,
        Commands::Paths {
            node: 11,
            format: OutputFormat::Json,
        },
    );
    assert_eq!(paths["paths"]["default"], "about/team");
    assert_eq!(paths["paths"]["5"], "unternehmen/team");

    let segments = json(
        &ctx,
        Commands::Segments {
            rebuild: false,
            format: OutputFormat::Json,
        },
    );
    assert_eq!(segments.as_object().unwrap().len(), 2);
    assert!(segments
        .as_object()
        .unwrap()
        .values()
        .any(|segment| segment == "de"));
}

#[test]
fn info_resolve_and_stats() {
    let temp = workspace();
    populate(temp.path());
    let ctx = CliContext::new(temp.path().to_path_buf(), None).unwrap();

    let info = json(
        &ctx,
        Commands::Info {
            path: "About/Team".to_string(),
            format: OutputFormat::Json,
        },
    );
    assert_eq!(info["node_id"], 11);
    assert_eq!(info["parent_id"], 10);
    assert_eq!(info["published"], true);

    let resolved = json(
        &ctx,
        Commands::Resolve {
            url: "/de/unternehmen/team".to_string(),
            format: OutputFormat::Json,
        },
    );
    assert_eq!(resolved["prefix"], "de");
    assert_eq!(resolved["locale_id"], 5);
    assert_eq!(resolved["page"]["node_id"], 11);

    let stats = json(
        &ctx,
        Commands::Stats {
            format: OutputFormat::Json,
        },
    );
    assert_eq!(stats["nodes"], 3);
    assert_eq!(stats["rows"], 5);
    assert!(stats["last_rebuild"].is_null());

    let missing = ctx
        .execute(&Commands::Info {
            path: "nowhere".to_string(),
            format: OutputFormat::Text,
        })
        .unwrap();
    assert_eq!(missing, "No page indexed at 'nowhere'");
}
