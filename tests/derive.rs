use serde_json::json;
use sqlx_askama_connector::{
    Error, ScalarType, SqlRenderer, SqlTemplate, TemplateArg, TemplateArgs,
};

#[derive(SqlRenderer)]
#[template(
    source = r#"select {% if count() %}count(*){% else %}id, name{% endif %} from {{ table }} where 1 = 1{% if check("name") %} and name = :name{% endif %}{% if check("ids") %} and id in :ids{% endif %}{% if check("recent") %} and created_at > :since{% endif %}{% if not_count() %} limit {{ render("limit") }}{% endif %}"#,
    ext = "txt"
)]
struct UserQuery {
    table: &'static str,
}

#[derive(SqlRenderer)]
#[template(source = "select * from {{ table }} where tag = '{{ tag }}'", ext = "txt")]
struct TaggedQuery<'a> {
    table: &'a str,
    tag: &'a str,
}

fn user_args() -> Vec<TemplateArg> {
    vec![
        TemplateArg::new("name", ScalarType::String).value("alice"),
        TemplateArg::new("ids", ScalarType::Int).multiple(true),
        TemplateArg::new("limit", ScalarType::Int).value(20).ignore(true),
    ]
}

#[test]
fn test_derived_renderer_uses_arguments() {
    let mut args = TemplateArgs::new();
    args.set_args(user_args());

    let sql = UserQuery { table: "users" }.render_sql(&args).unwrap();
    assert_eq!(
        sql,
        "select id, name from users where 1 = 1 and name = :name limit 20"
    );
}

#[test]
fn test_derived_renderer_count_flag() {
    let mut args = TemplateArgs::new();
    args.set_args(user_args());
    args.set_count(true);

    let sql = UserQuery { table: "users" }.render_sql(&args).unwrap();
    assert_eq!(sql, "select count(*) from users where 1 = 1 and name = :name");
}

#[test]
fn test_derived_renderer_with_lifetimes_does_not_escape() {
    let table = String::from("posts");
    let query = TaggedQuery {
        table: &table,
        tag: "<rust>",
    };
    let sql = query.render_sql(&TemplateArgs::new()).unwrap();
    assert_eq!(sql, "select * from posts where tag = '<rust>'");
}

#[test]
fn test_template_to_query_with_conditions() {
    let mut template = SqlTemplate::<_, sqlx::AnyPool>::new("users", UserQuery { table: "users" }, None)
        .with_args([
            TemplateArg::new("ids", ScalarType::Int)
                .multiple(true)
                .value(json!([3, 4])),
            TemplateArg::new("since", ScalarType::String).value("2024-01-01"),
            TemplateArg::new("limit", ScalarType::Int).value(5).ignore(true),
        ]);
    template.set_condition("recent", || true).unwrap();

    let query = template.to_query().unwrap();
    assert_eq!(
        query.statement().source(),
        "select id, name from users where 1 = 1 and id in :ids and created_at > :since limit 5"
    );
    let placeholders: Vec<_> = query.statement().placeholders().collect();
    assert_eq!(placeholders, vec!["ids", "since"]);

    assert!(matches!(
        template.set_condition("recent", || false),
        Err(Error::ConditionExists(key)) if key == "recent"
    ));
}

mod reports {
    use sqlx_askama_connector::SqlRenderer;

    #[derive(SqlRenderer)]
    #[template(
        source = "select day, total from {{ table }}{% if check(\"day\") %} where day = :day{% endif %}",
        ext = "txt"
    )]
    pub(crate) struct DailyTotals {
        pub(crate) table: &'static str,
    }
}

#[test]
fn test_derived_renderer_in_nested_module() {
    let mut args = TemplateArgs::new();
    args.set_args([TemplateArg::new("day", ScalarType::String).value("2024-05-01")]);

    let query = reports::DailyTotals { table: "totals" };
    assert_eq!(
        query.render_sql(&args).unwrap(),
        "select day, total from totals where day = :day"
    );
}
