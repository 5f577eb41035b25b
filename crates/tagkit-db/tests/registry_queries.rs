use std::sync::Arc;

use chrono::NaiveDate;
use tagkit_db::{
    serializers, Filter, Manager, MemoryTable, Model, ModelMeta, ModelRegistry, OrderBy, Value,
    DEFAULT_MANAGER,
};

struct Article {
    id: i64,
    title: &'static str,
    published: bool,
    created: NaiveDate,
}

impl Model for Article {
    fn meta() -> &'static ModelMeta {
        static META: ModelMeta = ModelMeta {
            app_label: "blog",
            object_name: "Article",
            ordering: &["-created"],
        };
        &META
    }

    fn pk(&self) -> Value {
        Value::Int(self.id)
    }

    fn field_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("title", Value::from(self.title)),
            ("published", Value::Bool(self.published)),
            ("created", Value::Date(self.created)),
        ]
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

fn registry() -> ModelRegistry {
    let articles = [
        Article { id: 1, title: "First", published: true, created: date(1) },
        Article { id: 2, title: "Draft", published: false, created: date(2) },
        Article { id: 3, title: "Third", published: true, created: date(3) },
    ];
    let mut registry = ModelRegistry::new();
    registry.register(Arc::new(MemoryTable::from_models(&articles)));
    registry
        .add_manager(
            "blog.Article",
            Manager::new("published_objects").with_filter(Filter::exact("published", true)),
        )
        .unwrap();
    registry
}

#[test]
fn test_default_manager_returns_everything() {
    let registry = registry();
    let entry = registry.get_model("blog.Article").unwrap();
    assert_eq!(DEFAULT_MANAGER, "objects");
    assert_eq!(entry.manager(DEFAULT_MANAGER).unwrap().count().unwrap(), 3);
    assert_eq!(
        entry.manager_names().collect::<Vec<_>>(),
        [DEFAULT_MANAGER, "published_objects"]
    );
}

#[test]
fn test_published_manager_with_default_ordering() {
    let registry = registry();
    let records = registry
        .get_model("blog.Article")
        .unwrap()
        .manager("published_objects")
        .unwrap()
        .fetch()
        .unwrap();
    let titles: Vec<_> = records.iter().map(|r| r.get("title").unwrap().to_string()).collect();
    assert_eq!(titles, vec!["Third", "First"]);
}

#[test]
fn test_filter_order_limit_chain() {
    let registry = registry();
    let qs = registry
        .get_model("blog.article")
        .unwrap()
        .objects()
        .unwrap()
        .filter(Filter::parse("published=True").unwrap())
        .order_by(OrderBy::parse_list("title"))
        .limit(1);
    let records = qs.fetch().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("title"), Some(&Value::from("First")));
}

#[test]
fn test_serialize_queryset_result() {
    let registry = registry();
    let records = registry
        .get_model("blog.Article")
        .unwrap()
        .objects()
        .unwrap()
        .filter(Filter::exact("id", 2_i64))
        .fetch()
        .unwrap();
    assert_eq!(
        serializers::serialize_json(&records).unwrap(),
        r#"[{"model":"blog.article","pk":2,"fields":{"title":"Draft","published":false,"created":"2024-05-02"}}]"#
    );
}
