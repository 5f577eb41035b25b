use std::sync::Arc;

use tagkit::prelude::*;

struct Event {
    id: i64,
    title: &'static str,
    city: &'static str,
}

static EVENT: ModelMeta = ModelMeta {
    app_label: "events",
    object_name: "Event",
    ordering: &["title"],
};

impl Model for Event {
    fn meta() -> &'static ModelMeta {
        &EVENT
    }

    fn pk(&self) -> Value {
        Value::Int(self.id)
    }

    fn field_values(&self) -> Vec<(&'static str, Value)> {
        vec![("title", Value::from(self.title)), ("city", Value::from(self.city))]
    }
}

fn engine() -> Engine {
    let events = [
        Event { id: 1, title: "RustConf", city: "Montreal" },
        Event { id: 2, title: "EuroRust", city: "Vienna" },
        Event { id: 3, title: "Oxidize", city: "Berlin" },
    ];
    let mut models = ModelRegistry::new();
    models.register(Arc::new(MemoryTable::from_models(&events)));
    tagkit::engine(Settings::default(), models)
}

#[test]
fn test_engine_has_both_libraries() {
    let engine = engine();
    assert_eq!(engine.libraries().names(), vec!["toolkit_filters", "toolkit_tags"]);
}

#[test]
fn test_host_models_are_listed() {
    let engine = engine();
    engine.add_string_template(
        "events/list.html",
        "{% for e in object_list %}{{ e.title }} ({{ e.city }}){% if not forloop.last %}, {% endif %}{% endfor %}",
    );
    let mut ctx = Context::new();
    let out = engine
        .render_string(
            "{% load toolkit_tags %}{% show_elements_list 'events.Event' limit 2 using 'events/list.html' %}",
            &mut ctx,
        )
        .unwrap();
    assert_eq!(out, "EuroRust (Vienna), Oxidize (Berlin)");
}

#[test]
fn test_form_field_annotation() {
    let engine = engine();
    engine.add_string_template("field.html", "<label>{{ field.label }}</label>{{ field.html }}");
    engine.add_string_template("checkbox.html", "{{ field.html }} {{ field.label }}");

    let mut ctx = Context::new();
    ctx.set(
        "fields",
        ContextValue::List(vec![
            BoundField::new(FieldDef::new("email", WidgetType::EmailInput), None, vec![], None).into(),
            BoundField::new(FieldDef::new("newsletter", WidgetType::CheckboxInput).required(false), None, vec![], None)
                .into(),
        ]),
    );
    let out = engine
        .render_string(
            "{% load toolkit_tags %}{% for f in fields %}{% annotate_form_field f %}\
{% if f.widget_type == 'CheckboxInput' %}{% include 'checkbox.html' with field=f %}\
{% else %}{% include 'field.html' with field=f %}{% endif %}|{% endfor %}",
            &mut ctx,
        )
        .unwrap();
    assert_eq!(
        out,
        "<label>Email</label><input type=\"email\" name=\"email\" value=\"\" id=\"id_email\" required=\"required\" />|\
<input type=\"checkbox\" name=\"newsletter\" id=\"id_newsletter\" /> Newsletter|"
    );
}

#[test]
fn test_errors_are_reexported() {
    let err = engine().from_string("{% load toolkit_tags %}{% setvar nope as x %}").unwrap_err();
    assert!(matches!(err, TagkitError::TemplateSyntaxError(_)));
}
