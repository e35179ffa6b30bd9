//! End-to-end rendering through `Liquefier` with templates on disk

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde::Serialize;
use tempfile::TempDir;

use object_liquefier::{
    ExecutionOptions, Liquefiable, LiquefyError, Liquefier, MemoryStore, NameMode, Settings,
    TemplateError, TypeIdentity, TypeRegistry, Value,
};

#[derive(Serialize)]
struct Person {
    name: String,
    birth: NaiveDate,
}

impl Liquefiable for Person {
    fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::class("Tests.Person", None)
    }

    fn to_value(&self) -> Result<Value, LiquefyError> {
        Ok(Value::from_serialize(self)?)
    }
}

#[derive(Serialize)]
struct Employee {
    name: String,
    birth: NaiveDate,
    company: String,
}

impl Liquefiable for Employee {
    fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::class("Tests.Employee", Some(&TypeIdentity::class("Tests.Person", None)))
    }

    fn to_value(&self) -> Result<Value, LiquefyError> {
        Ok(Value::from_serialize(self)?)
    }
}

fn felipe() -> Person {
    Person {
        name: "Felipe".to_string(),
        birth: NaiveDate::from_ymd_opt(1976, 3, 31).expect("valid date"),
    }
}

const PERSON_TEMPLATE: &str = "Name: {{ Name }}\nBirth: {{ Birth }}";
const EXPECTED: &str = "Name: Felipe\nBirth: 1976-03-31";

fn liquefier_in(dir: &Path) -> Liquefier {
    let folder = dir.to_path_buf();
    Liquefier::with_config(move |s| s.template_folder = folder)
}

fn write_template(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(name), source).expect("Should write template");
}

#[test]
fn test_ad_hoc_template() {
    let dir = TempDir::new().expect("temp dir");
    let liquefier = liquefier_in(dir.path());
    let text = liquefier
        .render(&felipe(), Some(PERSON_TEMPLATE))
        .expect("Should render");
    assert_eq!(text, EXPECTED);
}

#[test]
fn test_date_filter() {
    let dir = TempDir::new().expect("temp dir");
    let liquefier = liquefier_in(dir.path());
    let text = liquefier
        .render(&felipe(), Some("{{ Name }} was born on {{ Birth | date: '%d/%m/%Y' }}"))
        .expect("Should render");
    assert_eq!(text, "Felipe was born on 31/03/1976");
}

#[test]
fn test_ad_hoc_template_is_cached_by_hash() {
    let dir = TempDir::new().expect("temp dir");
    let liquefier = liquefier_in(dir.path());
    liquefier
        .render(&felipe(), Some(PERSON_TEMPLATE))
        .expect("Should render");
    assert!(liquefier
        .cache()
        .contains(&Liquefier::ad_hoc_key(PERSON_TEMPLATE)));
    assert!(!liquefier.cache().contains("tests.person"));
}

#[test]
fn test_template_from_disk() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "tests.person.liquid", PERSON_TEMPLATE);
    let liquefier = liquefier_in(dir.path());
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), EXPECTED);
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), EXPECTED);
    assert_eq!(liquefier.cache().len(), 1);
}

#[test]
fn test_leaf_name_template_from_disk() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "person.liquid", "{{ name }}");
    let liquefier = liquefier_in(dir.path());
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "Felipe");
}

#[test]
fn test_most_specific_template_wins() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "tests.person.liquid", "qualified");
    write_template(dir.path(), "person.liquid", "leaf");
    let liquefier = liquefier_in(dir.path());
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "qualified");

    fs::remove_file(dir.path().join("tests.person.liquid")).expect("Should delete");
    liquefier.clear_cache();
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "leaf");
}

#[test]
fn test_disk_then_ad_hoc() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "person.liquid", "disk {{ name }}");
    let liquefier = liquefier_in(dir.path());

    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "disk Felipe");
    assert_eq!(
        liquefier
            .render(&felipe(), Some("ad-hoc {{ name }}"))
            .expect("Should render"),
        "ad-hoc Felipe"
    );
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "disk Felipe");
}

#[test]
fn test_ad_hoc_then_disk() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "person.liquid", "disk {{ name }}");
    let liquefier = liquefier_in(dir.path());

    assert_eq!(
        liquefier
            .render(&felipe(), Some("ad-hoc {{ name }}"))
            .expect("Should render"),
        "ad-hoc Felipe"
    );
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "disk Felipe");
    assert_eq!(liquefier.cache().len(), 2);
}

#[test]
fn test_ad_hoc_without_disk_template() {
    let dir = TempDir::new().expect("temp dir");
    let liquefier = liquefier_in(dir.path());
    assert_eq!(
        liquefier
            .render(&felipe(), Some("{{ name }}"))
            .expect("Should render"),
        "Felipe"
    );
    assert_eq!(liquefier.try_render(&felipe(), None).expect("Should render"), None);
}

#[test]
fn test_cache_survives_deleted_folder() {
    let dir = TempDir::new().expect("temp dir");
    let folder = dir.path().join("templates");
    fs::create_dir(&folder).expect("Should create folder");
    write_template(&folder, "tests.person.liquid", PERSON_TEMPLATE);
    let liquefier = liquefier_in(&folder);

    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), EXPECTED);
    fs::remove_dir_all(&folder).expect("Should delete folder");
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), EXPECTED);

    liquefier.clear_cache();
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "");
}

#[test]
fn test_subclass_falls_back_to_base_template() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "person.liquid", "{{ name }}");
    let liquefier = liquefier_in(dir.path());
    let employee = Employee {
        name: "Ana".to_string(),
        birth: NaiveDate::from_ymd_opt(1990, 1, 2).expect("valid date"),
        company: "ACME".to_string(),
    };
    assert_eq!(liquefier.render(&employee, None).expect("Should render"), "Ana");

    write_template(dir.path(), "employee.liquid", "{{ name }} @ {{ company }}");
    liquefier.clear_cache();
    assert_eq!(liquefier.render(&employee, None).expect("Should render"), "Ana @ ACME");
}

#[test]
fn test_single_type_mode_ignores_base_templates() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "person.liquid", "{{ name }}");
    let folder = dir.path().to_path_buf();
    let liquefier = Liquefier::with_config(move |s| {
        s.template_folder = folder;
        s.name_mode = NameMode::SingleType;
    });
    let employee = Employee {
        name: "Ana".to_string(),
        birth: NaiveDate::from_ymd_opt(1990, 1, 2).expect("valid date"),
        company: "ACME".to_string(),
    };
    assert_eq!(liquefier.try_render(&employee, None).expect("Should render"), None);
}

#[test]
fn test_no_template_anywhere() {
    let dir = TempDir::new().expect("temp dir");
    let liquefier = liquefier_in(dir.path());
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "");
    assert_eq!(liquefier.try_render(&felipe(), None).expect("Should render"), None);

    let err = liquefier.render_strict(&felipe(), None).unwrap_err();
    match err {
        LiquefyError::Template(err) => {
            let name = err.attempted().expect("not-found error carries the names tried");
            assert_eq!(
                name.possible_names(),
                &["tests.person.liquid".to_string(), "person.liquid".to_string()]
            );
            assert!(matches!(err, TemplateError::NotFound { .. }));
        }
        other => panic!("Expected not found, got {:?}", other),
    }
}

#[test]
fn test_configuration_callback() {
    let liquefier = Liquefier::with_config(|s| {
        s.template_folder = "views".into();
        s.extension = ".tmpl".to_string();
        s.execution = ExecutionOptions::new().with_max_steps(567);
    });
    assert_eq!(liquefier.settings().template_folder, Path::new("views"));
    assert_eq!(liquefier.settings().execution.max_steps, 567);
    assert_eq!(liquefier.resolver().extension(), ".tmpl");
    assert_eq!(liquefier.engine().execution_options().max_steps, 567);
}

#[test]
fn test_settings_file() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("liquefier.toml");
    fs::write(
        &config,
        format!(
            "template_folder = {:?}\nextension = \".txt\"\n",
            dir.path().display().to_string()
        ),
    )
    .expect("Should write settings");
    write_template(dir.path(), "person.txt", "txt {{ name }}");

    let settings = Settings::from_file(&config).expect("Should load settings");
    let liquefier = Liquefier::from_settings(settings);
    assert_eq!(liquefier.render(&felipe(), None).expect("Should render"), "txt Felipe");
}

#[test]
fn test_concurrent_renders_share_cache() {
    let dir = TempDir::new().expect("temp dir");
    write_template(dir.path(), "person.liquid", PERSON_TEMPLATE);
    let liquefier = liquefier_in(dir.path());

    let results: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let liquefier = &liquefier;
                scope.spawn(move || {
                    let ad_hoc = (i % 2 == 0).then_some("{{ name }}");
                    liquefier.render(&felipe(), ad_hoc).expect("Should render")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    for (i, text) in results.iter().enumerate() {
        let expected = if i % 2 == 0 { "Felipe" } else { EXPECTED };
        assert_eq!(text, expected);
    }
    assert_eq!(liquefier.cache().len(), 2);
}

#[test]
fn test_nested_objects_from_typed_json() {
    let registry = TypeRegistry::from_str(
        r#"
        [[types]]
        name = "Shop.Order"

        [[types]]
        name = "Shop.Line"
        "#,
    )
    .expect("Should load registry");
    let json = serde_json::json!({
        "$type": "Shop.Order",
        "id": 7,
        "lines": [
            { "$type": "Shop.Line", "sku": "A", "qty": 2 },
            { "$type": "Shop.Line", "sku": "B", "qty": 1 }
        ]
    });
    let order = Value::from_json_typed(json, &registry).expect("Should convert");

    let store = MemoryStore::new();
    store.insert(
        "liquefier/order.liquid",
        "Order {{ id }}:{% for line in lines %} {% liquefy line %}{% endfor %}",
    );
    store.insert("liquefier/line.liquid", "{{ qty }}x{{ sku }}");
    let liquefier = Liquefier::with_store(Settings::default(), Arc::new(store));

    assert_eq!(
        liquefier.render(&order, None).expect("Should render"),
        "Order 7: 2xA 1xB"
    );
    assert!(liquefier.cache().contains("shop.line"));
}
