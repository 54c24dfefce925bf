mod support;

use relmap_core::{Cx, Descriptor, FieldInfo, FieldShape, Model, RelationDecl, Value};
use relmap_macros::Model;
use relmap_query::Session;

use support::{FakeDb, block_on, expect_err, row, unwrap_outcome};

#[derive(Model, Debug, Default, Clone, PartialEq)]
struct User {
    #[relmap(primary_key, auto_increment)]
    user_id: i64,
    name: String,
    #[relmap(relation = "has_one", table = "profile")]
    profile: Option<Box<Profile>>,
    #[relmap(relation = "has_many", table = "post")]
    posts: Vec<Post>,
}

#[derive(Model, Debug, Default, Clone, PartialEq)]
struct Profile {
    #[relmap(primary_key)]
    id: i64,
    user_id: i64,
    bio: String,
}

#[derive(Model, Debug, Default, Clone, PartialEq)]
struct Post {
    #[relmap(primary_key)]
    id: i64,
    user_id: Option<i64>,
    title: String,
    #[relmap(relation = "belongs_to", table = "user")]
    author: Option<Box<User>>,
}

fn user_row(id: i64, name: &str) -> relmap_core::Row {
    row(&[("user_id", Value::BigInt(id)), ("name", Value::from(name))])
}

fn post_row(id: i64, user_id: Option<i64>, title: &str) -> relmap_core::Row {
    row(&[
        ("id", Value::BigInt(id)),
        ("user_id", Value::from(user_id)),
        ("title", Value::from(title)),
    ])
}

fn fixture() -> FakeDb {
    FakeDb::new()
        .table(
            "user",
            vec![user_row(1, "ann"), user_row(2, "bob"), user_row(3, "cy")],
        )
        .table(
            "post",
            vec![
                post_row(10, Some(1), "a1"),
                post_row(11, Some(3), "c1"),
                post_row(12, Some(1), "a2"),
                post_row(13, None, "orphan"),
            ],
        )
        .table(
            "profile",
            vec![row(&[
                ("id", Value::Int(100)),
                ("user_id", Value::Int(3)),
                ("bio", Value::from("hi")),
            ])],
        )
}

#[test]
fn batch_has_many_issues_one_query_per_relation() {
    let db = fixture();
    let cx = Cx::for_testing();
    let users: Vec<User> = block_on(async {
        unwrap_outcome(
            Session::new(&db)
                .select_many(&cx, "SELECT * FROM user", &[])
                .await,
        )
    });

    // primary + one has_one + one has_many
    assert_eq!(db.query_count(), 3);
    let statements = db.statements();
    assert_eq!(
        statements[2].0,
        "SELECT * FROM post WHERE user_id IN (?, ?, ?)"
    );
    assert_eq!(
        statements[2].1,
        vec![Value::BigInt(1), Value::BigInt(2), Value::BigInt(3)]
    );

    let titles: Vec<Vec<&str>> = users
        .iter()
        .map(|u| u.posts.iter().map(|p| p.title.as_str()).collect())
        .collect();
    assert_eq!(titles, vec![vec!["a1", "a2"], vec![], vec!["c1"]]);

    assert!(users[0].profile.is_none());
    assert!(users[1].profile.is_none());
    assert_eq!(users[2].profile.as_ref().map(|p| p.bio.as_str()), Some("hi"));
}

#[test]
fn batch_children_attach_to_every_parent_sharing_a_key() {
    let profile = |id: i64, user_id: i64| {
        row(&[
            ("id", Value::BigInt(id)),
            ("user_id", Value::BigInt(user_id)),
            ("bio", Value::from(format!("bio{id}"))),
        ])
    };
    let db = FakeDb::new()
        .table(
            "user",
            vec![user_row(1, "ann"), user_row(1, "ann again"), user_row(2, "bob")],
        )
        .table("profile", vec![profile(5, 1), profile(6, 1)])
        .table(
            "post",
            vec![post_row(9, Some(1), "newer"), post_row(8, Some(1), "older")],
        );
    let cx = Cx::for_testing();
    let users: Vec<User> = block_on(async {
        unwrap_outcome(
            Session::new(&db)
                .select_many(&cx, "SELECT * FROM user", &[])
                .await,
        )
    });

    let statements = db.statements();
    assert_eq!(statements.len(), 3);
    for (_, params) in &statements[1..] {
        assert_eq!(params, &vec![Value::BigInt(1), Value::BigInt(2)]);
    }

    let loaded: Vec<(i64, Option<i64>, Vec<i64>)> = users
        .iter()
        .map(|u| {
            (
                u.user_id,
                u.profile.as_ref().map(|p| p.id),
                u.posts.iter().map(|p| p.id).collect(),
            )
        })
        .collect();
    // has-one keeps the last matching row; has-many keeps database order
    assert_eq!(
        loaded,
        vec![
            (1, Some(6), vec![9, 8]),
            (1, Some(6), vec![9, 8]),
            (2, None, vec![]),
        ]
    );
}

#[test]
fn batch_belongs_to_groups_by_foreign_key() {
    let db = fixture();
    let cx = Cx::for_testing();
    let posts: Vec<Post> = block_on(async {
        unwrap_outcome(
            Session::new(&db)
                .select_many(&cx, "SELECT * FROM post", &[])
                .await,
        )
    });

    assert_eq!(db.query_count(), 2);
    let (sql, params) = &db.statements()[1];
    assert_eq!(sql, "SELECT * FROM user WHERE user_id IN (?, ?)");
    assert_eq!(params, &vec![Value::BigInt(1), Value::BigInt(3)]);

    let authors: Vec<Option<&str>> = posts
        .iter()
        .map(|p| p.author.as_ref().map(|u| u.name.as_str()))
        .collect();
    assert_eq!(authors, vec![Some("ann"), Some("cy"), Some("ann"), None]);
}

#[test]
fn single_parent_with_no_children() {
    let db = fixture();
    let cx = Cx::for_testing();
    let bob: User = block_on(async {
        unwrap_outcome(
            Session::new(&db)
                .select_one(&cx, "SELECT * FROM user WHERE user_id = ?", &[Value::BigInt(2)])
                .await,
        )
    });

    assert_eq!(bob.name, "bob");
    assert!(bob.profile.is_none());
    assert!(bob.posts.is_empty());

    let statements = db.statements();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[1].0, "SELECT * FROM profile WHERE user_id = ? LIMIT 1");
    assert_eq!(statements[2].0, "SELECT * FROM post WHERE user_id = ?");
}

#[test]
fn single_parent_null_key_skips_query() {
    let db = fixture();
    let cx = Cx::for_testing();
    let orphan: Post = block_on(async {
        unwrap_outcome(
            Session::new(&db)
                .select_by_pk(&cx, 13_i64)
                .await,
        )
    });

    assert_eq!(orphan.title, "orphan");
    assert!(orphan.author.is_none());
    assert_eq!(db.query_count(), 1);
    assert_eq!(db.statements()[0].0, "SELECT * FROM post WHERE id = ?");
}

#[test]
fn select_one_without_rows_is_no_rows() {
    let db = fixture();
    let cx = Cx::for_testing();
    let err = block_on(async {
        expect_err(
            Session::new(&db)
                .select_one::<User>(&cx, "SELECT * FROM user WHERE user_id = ?", &[Value::BigInt(99)])
                .await,
        )
    });
    assert!(err.is_no_rows());
}

#[test]
fn empty_parent_set_issues_no_follow_up() {
    let db = FakeDb::new();
    let cx = Cx::for_testing();
    let users: Vec<User> = block_on(async {
        unwrap_outcome(
            Session::new(&db)
                .select_many(&cx, "SELECT * FROM user", &[])
                .await,
        )
    });
    assert!(users.is_empty());
    assert_eq!(db.query_count(), 1);
}

#[test]
fn follow_up_failure_aborts_the_load() {
    let mut db = fixture();
    db.fail_on = Some("FROM post");
    let cx = Cx::for_testing();
    let err = block_on(async {
        expect_err(
            Session::new(&db)
                .select_many::<User>(&cx, "SELECT * FROM user", &[])
                .await,
        )
    });
    assert_eq!(err.sql(), Some("SELECT * FROM post WHERE user_id IN (?, ?, ?)"));
}

/// Hand-written impl whose relation has no target table.
#[derive(Debug, Default)]
struct Broken {
    id: i64,
    items: Vec<Post>,
}

static BROKEN_FIELDS: &[FieldInfo] = &[
    FieldInfo::new("id", "Id", "id").primary_key(true),
    FieldInfo::new("items", "Items", "items").relation(true),
];

fn post_fields() -> &'static [FieldInfo] {
    Post::fields()
}

static BROKEN_RELATIONS: &[RelationDecl] = &[RelationDecl {
    field: "Items",
    kind: "has_many",
    table: "",
    shape: FieldShape::Collection,
    target_type: "Post",
    target_fields: post_fields,
}];

impl Model for Broken {
    const TYPE_NAME: &'static str = "Broken";
    const TABLE_NAME: &'static str = "broken";

    fn fields() -> &'static [FieldInfo] {
        BROKEN_FIELDS
    }

    fn relations() -> &'static [RelationDecl] {
        BROKEN_RELATIONS
    }

    fn scan_field(&mut self, field: &str, value: &Value) -> relmap_core::Result<bool> {
        if field == "Id" {
            self.id = relmap_core::FromValue::from_value(value)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        (field == "Id").then(|| Value::from(self.id))
    }
}

#[test]
fn malformed_relation_fails_before_any_query() {
    let db = fixture();
    let cx = Cx::for_testing();
    assert!(Descriptor::of::<Broken>().unwrap_err().is_config());
    assert!(Broken::default().items.is_empty());

    let err = block_on(async {
        expect_err(
            Session::new(&db)
                .select_many::<Broken>(&cx, "SELECT * FROM broken", &[])
                .await,
        )
    });
    assert!(err.is_config());
    assert_eq!(db.query_count(), 0);
}
