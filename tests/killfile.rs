//! Loading a realistic killfile through each rule source.

use pretty_assertions::assert_eq;
use sidekick::client::{Entry, Feed};
use sidekick::filter::FilterEngine;
use sidekick::rules::{parse_killfile, Comparator, Field, ParseWarningKind, RuleRepository, RuleSource, Selector};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KILLFILE: &str = r#"# Sponsored posts everywhere
ignore-article "*" "title =~ \[Sponsor\]"

ignore-article "https://blog.example/rss" "title # Moon,Sun"
ignore-article "category:News, Tech" "content !# rust"
ignore-article "*" "author =~ (?i)^bot"
this line is not a rule
ignore-article "*" "summary =~ anything"
"#;

fn feed(url: &str, category: &str) -> Feed {
    Feed {
        id: 1,
        url: url.to_string(),
        category: category.to_string(),
    }
}

fn entry(id: i64, title: &str, content: &str, author: &str) -> Entry {
    Entry {
        id,
        feed_id: 1,
        title: title.to_string(),
        content: content.to_string(),
        author: author.to_string(),
    }
}

#[test]
fn test_parse_realistic_killfile() {
    let outcome = parse_killfile(KILLFILE);

    assert_eq!(outcome.rules.len(), 4);
    assert_eq!(outcome.warnings.len(), 2);
    assert_eq!(outcome.warnings[0].line, 7);
    assert!(matches!(outcome.warnings[0].kind, ParseWarningKind::Malformed));
    assert_eq!(outcome.warnings[1].line, 8);
    assert!(matches!(
        outcome.warnings[1].kind,
        ParseWarningKind::InvalidExpression(_)
    ));

    let categories = &outcome.rules[2];
    assert_eq!(
        categories.selector(),
        &Selector::Categories(vec!["news".to_string(), "tech".to_string()])
    );
    assert_eq!(categories.expression().field(), Field::Content);
    assert_eq!(categories.expression().comparator(), Comparator::ContainsNone);
}

#[test]
fn test_realistic_killfile_verdicts() {
    let rules = parse_killfile(KILLFILE).rules;
    let engine = FilterEngine::new();

    let blog = feed("https://blog.example/rss", "Personal");
    let applicable = FilterEngine::applicable_rules(&rules, &blog);
    assert_eq!(applicable.len(), 3);

    let entries = vec![
        entry(1, "[Sponsor] Great deal", "", "alice"),
        entry(2, "Sunset photos", "", "alice"),
        entry(3, "Weekly notes", "", "Bot-3000"),
        entry(4, "Weekly notes", "", "alice"),
    ];
    assert_eq!(engine.suppressed_entries(&applicable, &entries), vec![1, 2, 3]);

    let news = feed("https://news.example/atom", "news");
    let applicable = FilterEngine::applicable_rules(&rules, &news);
    let entries = vec![
        entry(5, "Release", "all about rust", "alice"),
        entry(6, "Release", "all about go", "alice"),
    ];
    assert_eq!(engine.suppressed_entries(&applicable, &entries), vec![6]);
}

#[tokio::test]
async fn test_local_killfile_loads_through_repository() {
    let dir = std::env::temp_dir().join("sidekick_it_local_killfile");
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("killfile");
    std::fs::write(&file, KILLFILE).unwrap();

    let repo = RuleRepository::new(RuleSource::local(file.clone()));
    let rules = repo.fetch().await.unwrap();
    repo.set_cached_rules(rules);

    assert_eq!(repo.rules().len(), 4);
    assert!(repo.loaded_at().is_some());
    assert!(repo.source().is_local());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_remote_killfile_loads_through_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/killfile"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KILLFILE))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/killfile", server.uri())).unwrap();
    let repo = RuleRepository::new(RuleSource::remote(url).unwrap());
    repo.reload().await.unwrap();

    assert_eq!(repo.rules().len(), 4);
    assert_eq!(repo.rules()[1].raw_selector(), "https://blog.example/rss");
}
