mod common;

use relmap::{Cx, Value};

use common::{Author, Bio, Book, author, block_on, book, orm, unwrap_outcome};

/// ann has two books, bob none, cy one book and a bio; one book is orphaned.
fn seed(orm: &relmap::Orm<relmap::SqliteConnection>, cx: &Cx) {
    block_on(async {
        let mut authors = vec![author("ann"), author("bob"), author("cy")];
        unwrap_outcome(orm.insert_batch(cx, &mut authors).await);
        let [ann, _, cy] = [authors[0].author_id, authors[1].author_id, authors[2].author_id];

        let mut books = vec![
            book(Some(ann), "a1"),
            book(Some(cy), "c1"),
            book(Some(ann), "a2"),
            book(None, "orphan"),
        ];
        unwrap_outcome(orm.insert_batch(cx, &mut books).await);

        let mut bio = Bio {
            author_id: cy,
            text: "hi".into(),
            ..Bio::default()
        };
        unwrap_outcome(orm.insert(cx, &mut bio).await);
    });
}

#[test]
fn has_one_and_has_many_load_for_every_parent() {
    let orm = orm();
    let cx = Cx::for_testing();
    seed(&orm, &cx);

    let authors: Vec<Author> = block_on(async {
        unwrap_outcome(
            orm.select_many(&cx, "SELECT * FROM author ORDER BY author_id", &[])
                .await,
        )
    });

    let names: Vec<&str> = authors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["ann", "bob", "cy"]);

    let titles: Vec<Vec<&str>> = authors
        .iter()
        .map(|a| a.books.iter().map(|b| b.title.as_str()).collect())
        .collect();
    assert_eq!(titles, vec![vec!["a1", "a2"], vec![], vec!["c1"]]);

    assert!(authors[0].bio.is_none());
    assert!(authors[1].bio.is_none());
    assert_eq!(authors[2].bio.as_ref().map(|b| b.text.as_str()), Some("hi"));
}

#[test]
fn belongs_to_loads_owner_and_skips_null_keys() {
    let orm = orm();
    let cx = Cx::for_testing();
    seed(&orm, &cx);

    let books: Vec<Book> = block_on(async {
        unwrap_outcome(orm.select_many(&cx, "SELECT * FROM book ORDER BY id", &[]).await)
    });
    let owners: Vec<Option<&str>> = books
        .iter()
        .map(|b| b.author.as_ref().map(|a| a.name.as_str()))
        .collect();
    assert_eq!(owners, [Some("ann"), Some("cy"), Some("ann"), None]);

    let orphan: Book = block_on(async {
        unwrap_outcome(
            orm.select_one(&cx, "SELECT * FROM book WHERE title = ?", &[Value::from("orphan")])
                .await,
        )
    });
    assert_eq!(orphan.author_id, None);
    assert!(orphan.author.is_none());
}

#[test]
fn select_by_pk_resolves_relations() {
    let orm = orm();
    let cx = Cx::for_testing();
    seed(&orm, &cx);

    let cy: Author = block_on(async { unwrap_outcome(orm.select_by_pk(&cx, 3_i64).await) });
    assert_eq!(cy.name, "cy");
    assert_eq!(cy.books.len(), 1);
    assert_eq!(cy.bio.map(|b| b.author_id), Some(3));
}

#[test]
fn raw_and_scalar_reads_against_sqlite() {
    let orm = orm();
    let cx = Cx::for_testing();
    seed(&orm, &cx);

    block_on(async {
        let count = unwrap_outcome(orm.select_int(&cx, "SELECT COUNT(*) FROM book", &[]).await);
        assert_eq!(count, 4);

        let name = unwrap_outcome(
            orm.select_str(&cx, "SELECT name FROM author WHERE author_id = ?", &[Value::from(2_i64)])
                .await,
        );
        assert_eq!(name, "bob");

        let titles: Vec<String> = unwrap_outcome(
            orm.select_column(&cx, "SELECT title FROM book WHERE author_id IS NULL", &[])
                .await,
        );
        assert_eq!(titles, ["orphan"]);

        let (columns, rows) = unwrap_outcome(
            orm.select_raw(&cx, "SELECT id, author_id FROM book ORDER BY id DESC LIMIT 1", &[])
                .await,
        );
        assert_eq!(columns, ["id", "author_id"]);
        assert_eq!(rows, vec![vec!["4".to_string(), String::new()]]);

        let (columns, rows) = unwrap_outcome(
            orm.select_raw(&cx, "SELECT id, title FROM book WHERE id > 100", &[])
                .await,
        );
        assert_eq!(columns, ["id", "title"]);
        assert!(rows.is_empty());

        let sets = unwrap_outcome(
            orm.select_raw_set(&cx, "SELECT author_id, name FROM author ORDER BY author_id", &[])
                .await,
        );
        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].get("AuthorId").map(String::as_str), Some("1"));
        assert_eq!(sets[2].get("Name").map(String::as_str), Some("cy"));
    });
}
