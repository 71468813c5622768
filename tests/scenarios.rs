use fieldctl::{
    validate_payload, ConfigurationRegistry, ControlLevel, ElementDefinition, EntityConfiguration,
    EntityDefinition, FieldRule, MandatoryFlagPolicy, Record, RuleError, SettingsLayer, Texts,
    UnknownFieldPolicy,
};
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn books() -> EntityDefinition {
    EntityDefinition::new("CatalogService.Books")
        .key("ID")
        .element(ElementDefinition::attribute("title"))
        .element(ElementDefinition::attribute("description"))
        .element(ElementDefinition::attribute("enableDetails"))
}

fn details_rules() -> EntityConfiguration {
    EntityConfiguration::new()
        .field("title", FieldRule::new().fixed(ControlLevel::Mandatory))
        .field(
            "description",
            FieldRule::new().resolve(|book, _ctx| {
                let enabled = book.get("enableDetails").and_then(Value::as_bool).unwrap_or(false);
                Ok(Some(if enabled { ControlLevel::Mandatory } else { ControlLevel::Hidden }))
            }),
        )
}

fn registry(config: EntityConfiguration) -> ConfigurationRegistry {
    ConfigurationRegistry::builder()
        .register(books(), config)
        .unwrap()
        .build()
        .unwrap()
}

#[tokio::test]
async fn mandatory_title_is_required_when_cleared() {
    let registry = registry(details_rules());
    let mut book = json!({"ID": 1, "title": null, "enableDetails": false});
    registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();

    assert_eq!(book["title_fc"], json!(7));
    assert_eq!(book["description_fc"], json!(0));

    let controls = registry.controls("Books").unwrap();
    let texts = Texts::with_defaults();
    let resolved = book.as_object().unwrap();
    let report = validate_payload(controls, &texts, resolved, &record(json!({"title": null}))).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.errors[0].field_name, "title");
    assert_eq!(report.errors[0].message, "Field title is required");
}

#[tokio::test]
async fn hidden_description_rejects_edit() {
    let registry = registry(details_rules());
    let mut book = json!({"ID": 1, "title": null, "enableDetails": false});
    registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();

    let controls = registry.controls("Books").unwrap();
    let texts = Texts::with_defaults();
    let report = validate_payload(
        controls,
        &texts,
        book.as_object().unwrap(),
        &record(json!({"description": "x"})),
    )
    .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.errors[0].field_name, "description");
    assert_eq!(report.errors[0].message, "Field description is read-only");
}

#[tokio::test]
async fn custom_validator_reports_short_title() {
    let config = EntityConfiguration::new().field(
        "title",
        FieldRule::new().fixed(ControlLevel::Optional).validate(|value, helper| {
            let short = value.as_str().map_or(true, |s| s.chars().count() < 10);
            Ok(short.then(|| helper.get_text("book.validation.title.minLength", &["10"])))
        }),
    );
    let registry = registry(config);
    let mut book = json!({"ID": 1, "title": "A long enough title"});
    registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();

    let texts = Texts::new().with("book.validation.title.minLength", "Title needs at least {0} characters");
    let report = validate_payload(
        registry.controls("Books").unwrap(),
        &texts,
        book.as_object().unwrap(),
        &record(json!({"title": "short"})),
    )
    .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.errors[0].message, "Title needs at least 10 characters");
}

#[tokio::test]
async fn association_cascade_runs_before_parent_resolvers() {
    let authors = EntityDefinition::new("CatalogService.Authors")
        .key("ID")
        .element(ElementDefinition::attribute("name"));
    let author_rules = EntityConfiguration::new().field("name", FieldRule::new().fixed(ControlLevel::ReadOnly));

    let books = books().element(ElementDefinition::association("author", ["author_ID"]));
    let book_rules = EntityConfiguration::new()
        .settings(SettingsLayer::new().use_impl("author", "Authors"))
        .field(
            "author",
            FieldRule::new().resolve(|_, ctx| {
                let name_fc = ctx
                    .cascaded("author")
                    .and_then(|author| author.get("name_fc"))
                    .and_then(ControlLevel::from_value);
                Ok(Some(match name_fc {
                    Some(ControlLevel::ReadOnly) => ControlLevel::ReadOnly,
                    _ => ControlLevel::Optional,
                }))
            }),
        );

    let registry = ConfigurationRegistry::builder()
        .register(authors, author_rules)
        .unwrap()
        .register(books, book_rules)
        .unwrap()
        .build()
        .unwrap();

    let mut book = json!({"ID": 1, "author": {"ID": 7, "name": "Poe"}, "author_ID": 7});
    registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();

    assert_eq!(book["author"], json!({"ID": 7, "name": "Poe", "name_fc": 1}));
    assert_eq!(book["author_fc"], json!(1));
    let keys: Vec<_> = book.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["ID", "author", "author_ID", "author_fc"]);
}

#[tokio::test]
async fn calculation_is_idempotent() {
    let registry = registry(details_rules());
    let mut book = json!({"ID": 1, "enableDetails": true});
    let resolver = registry.resolver();
    resolver.calculate_field_controls("Books", &mut book).await.unwrap();
    let first = book.clone();
    resolver.calculate_field_controls("Books", &mut book).await.unwrap();
    assert_eq!(book, first);
    assert_eq!(book["description_fc"], json!(7));
}

#[tokio::test]
async fn batch_keeps_length_and_order() {
    let registry = registry(details_rules());
    let mut books = json!([
        {"ID": 1, "enableDetails": true},
        {"ID": 2, "enableDetails": false},
        {"ID": 3},
    ]);
    registry
        .resolver()
        .calculate_field_controls("Books", &mut books)
        .await
        .unwrap();

    let levels: Vec<_> = books
        .as_array()
        .unwrap()
        .iter()
        .map(|b| (b["ID"].clone(), b["description_fc"].clone()))
        .collect();
    assert_eq!(
        levels,
        vec![(json!(1), json!(7)), (json!(2), json!(0)), (json!(3), json!(0))]
    );
}

#[tokio::test]
async fn null_payload_is_untouched() {
    let registry = registry(details_rules());
    let mut nothing = Value::Null;
    registry
        .resolver()
        .calculate_field_controls("Books", &mut nothing)
        .await
        .unwrap();
    assert!(nothing.is_null());
}

#[tokio::test]
async fn unknown_entity_is_a_config_error() {
    let registry = registry(details_rules());
    let mut book = json!({"ID": 1});
    let err = registry
        .resolver()
        .calculate_field_controls("Authors", &mut book)
        .await
        .unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn unknown_field_policy_switch() {
    let config = || EntityConfiguration::new().field("rating", FieldRule::new().fixed(ControlLevel::Optional));

    let skipping = registry(config());
    let mut book = json!({"ID": 1});
    skipping.resolver().calculate_field_controls("Books", &mut book).await.unwrap();
    assert!(book.get("rating_fc").is_none());

    let defaulting = registry(config().settings(SettingsLayer::new().unknown_field(UnknownFieldPolicy::DefaultBinding)));
    let mut book = json!({"ID": 1});
    defaulting.resolver().calculate_field_controls("Books", &mut book).await.unwrap();
    assert_eq!(book["rating_fc"], json!(3));

    let call_site = SettingsLayer::new().unknown_field(UnknownFieldPolicy::DefaultBinding);
    let mut book = json!({"ID": 1});
    skipping
        .resolver()
        .with_overrides(&call_site)
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();
    assert_eq!(book["rating_fc"], json!(3));
}

#[tokio::test]
async fn mandatory_flag_policy_switch() {
    let definition = || {
        EntityDefinition::new("Books")
            .key("ID")
            .element(ElementDefinition::attribute("isbn").mandatory())
    };
    let rules = || EntityConfiguration::new().field("isbn", FieldRule::new().fixed(ControlLevel::ReadOnly));

    let seeded = ConfigurationRegistry::builder()
        .register(definition(), rules())
        .unwrap()
        .build()
        .unwrap();
    let mut book = json!({"ID": 1});
    seeded.resolver().calculate_field_controls("Books", &mut book).await.unwrap();
    assert_eq!(book["isbn_fc"], json!(1));

    let overriding = ConfigurationRegistry::builder()
        .global(SettingsLayer::new().mandatory_flag(MandatoryFlagPolicy::Override))
        .register(definition(), rules())
        .unwrap()
        .build()
        .unwrap();
    let mut book = json!({"ID": 1});
    overriding.resolver().calculate_field_controls("Books", &mut book).await.unwrap();
    assert_eq!(book["isbn_fc"], json!(7));

    let call_site = SettingsLayer::new().mandatory_flag(MandatoryFlagPolicy::Override);
    let mut book = json!({"ID": 1});
    seeded
        .resolver()
        .with_overrides(&call_site)
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();
    assert_eq!(book["isbn_fc"], json!(7));
}

fn catalog(book_settings: SettingsLayer, editor_name: FieldRule) -> ConfigurationRegistry {
    let authors = EntityDefinition::new("CatalogService.Authors")
        .key("ID")
        .element(ElementDefinition::attribute("name"));
    let editors = EntityDefinition::new("CatalogService.Editors")
        .key("ID")
        .element(ElementDefinition::attribute("name"));
    let books = EntityDefinition::new("CatalogService.Books")
        .key("ID")
        .element(ElementDefinition::composition("authors"))
        .element(ElementDefinition::association("editor", ["editor_ID"]));

    ConfigurationRegistry::builder()
        .register(
            authors,
            EntityConfiguration::new().field("name", FieldRule::new().fixed(ControlLevel::ReadOnly)),
        )
        .unwrap()
        .register(editors, EntityConfiguration::new().field("name", editor_name))
        .unwrap()
        .register(books, EntityConfiguration::new().settings(book_settings))
        .unwrap()
        .build()
        .unwrap()
}

fn delegating() -> SettingsLayer {
    SettingsLayer::new()
        .use_impl("authors", "Authors")
        .use_impl("editor", "Editors")
}

fn failing_name() -> FieldRule {
    FieldRule::new().resolve(|_, _| Err(RuleError::new("editor service down")))
}

#[tokio::test]
async fn cascade_covers_arrays_and_several_associations() {
    let registry = catalog(delegating(), FieldRule::new().fixed(ControlLevel::Optional));
    let mut book = json!({
        "ID": 1,
        "authors": [{"ID": 1, "name": "Poe"}, {"ID": 2, "name": "Baudelaire"}],
        "editor": {"ID": 5, "name": "Griswold"},
    });

    registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();

    assert_eq!(
        book["authors"],
        json!([
            {"ID": 1, "name": "Poe", "name_fc": 1},
            {"ID": 2, "name": "Baudelaire", "name_fc": 1},
        ])
    );
    assert_eq!(book["editor"]["name_fc"], json!(3));
}

#[tokio::test]
async fn cascade_skips_null_and_absent_associations() {
    let registry = catalog(delegating(), failing_name());
    let mut book = json!({"ID": 1, "editor": null});

    registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();

    assert_eq!(book, json!({"ID": 1, "editor": null}));
}

#[tokio::test]
async fn cascade_failure_puts_nested_values_back() {
    let registry = catalog(delegating(), failing_name());
    let mut book = json!({
        "ID": 1,
        "authors": [{"ID": 1, "name": "Poe"}],
        "editor": {"ID": 5, "name": "Griswold"},
        "editor_ID": 5,
    });

    let err = registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap_err();

    assert!(err.is_rule());
    assert_eq!(book["editor"], json!({"ID": 5, "name": "Griswold"}));
    assert_eq!(book["authors"][0]["name_fc"], json!(1));
    let keys: Vec<_> = book.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["ID", "authors", "editor", "editor_ID"]);
}

#[tokio::test]
async fn call_site_delegation_cascades() {
    let registry = catalog(SettingsLayer::new(), FieldRule::new().fixed(ControlLevel::Optional));
    let nested = json!({"ID": 1, "editor": {"ID": 5, "name": "Griswold"}});

    let mut book = nested.clone();
    registry
        .resolver()
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();
    assert_eq!(book, nested);

    let call_site = SettingsLayer::new().use_impl("editor", "Editors");
    let mut book = nested.clone();
    registry
        .resolver()
        .with_overrides(&call_site)
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap();
    assert_eq!(book["editor"]["name_fc"], json!(3));
}

#[tokio::test]
async fn unknown_call_site_delegate_leaves_payload_intact() {
    let registry = catalog(delegating(), FieldRule::new().fixed(ControlLevel::Optional));
    let original = json!({
        "ID": 1,
        "authors": [{"ID": 1, "name": "Poe"}],
        "editor": {"ID": 5, "name": "Griswold"},
    });
    let call_site = SettingsLayer::new().use_impl("editor", "Publishers");

    let mut book = original.clone();
    let err = registry
        .resolver()
        .with_overrides(&call_site)
        .calculate_field_controls("Books", &mut book)
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert_eq!(book, original);
}
