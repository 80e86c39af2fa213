use chrono::Duration;
use quiz_core::model::{
    AnswerDetail, AnswerId, AnswerOption, NewQuizResult, PersistedSession, Question, QuestionId,
    Quiz, QuizId, RevealPolicy, UserId,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    QuestionSource, QuizRepository, ResultHistoryRepository, ResultSink, SessionStore,
    StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_quiz(id: u64, first_question: u64) -> Quiz {
    let questions = (first_question..first_question + 3)
        .map(|qid| {
            Question::new(
                QuestionId::new(qid),
                format!("Question {qid}"),
                vec![
                    AnswerOption::new(AnswerId::new(qid * 10 + 2), "wrong", false),
                    AnswerOption::new(AnswerId::new(qid * 10 + 1), "right", true),
                ],
            )
            .unwrap()
        })
        .collect();
    Quiz::new(QuizId::new(id), format!("Quiz {id}"), questions, fixed_now())
        .unwrap()
        .with_author("admin")
        .with_time_limit(5)
        .with_reveal_policy(RevealPolicy::Deferred)
}

#[tokio::test]
async fn sqlite_roundtrips_quiz_content_in_order() {
    let repo = connect("memdb_quiz_roundtrip").await;
    let quiz = build_quiz(1, 10);
    repo.upsert_quiz(&quiz).await.unwrap();

    let fetched = repo.fetch_quiz(QuizId::new(1)).await.unwrap();
    assert_eq!(fetched, quiz);

    let page = repo.fetch_question(QuizId::new(1), 2).await.unwrap();
    assert_eq!(page.question.id(), QuestionId::new(12));
    assert_eq!(page.question.answers()[0].text, "wrong");
    assert_eq!(page.total_questions, 3);
    assert_eq!(page.time_limit_minutes, 5);
    assert_eq!(page.reveal_policy, RevealPolicy::Deferred);

    let err = repo.fetch_question(QuizId::new(1), 3).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let listed = repo.list_quizzes().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].question_count, 3);
}

#[tokio::test]
async fn sqlite_upsert_replaces_questions_and_detects_conflicts() {
    let repo = connect("memdb_quiz_upsert").await;
    repo.upsert_quiz(&build_quiz(1, 10)).await.unwrap();
    repo.upsert_quiz(&build_quiz(1, 20)).await.unwrap();

    let fetched = repo.fetch_quiz(QuizId::new(1)).await.unwrap();
    assert_eq!(fetched.questions()[0].id(), QuestionId::new(20));

    let err = repo.upsert_quiz(&build_quiz(2, 21)).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_results_keep_details_and_order() {
    let repo = connect("memdb_results").await;
    let detail = AnswerDetail {
        question_index: 0,
        question_id: QuestionId::new(10),
        question_text: "Question 10".into(),
        user_answer_text: "right".into(),
        correct_answer_text: Some("right".into()),
        is_correct: true,
    };
    let base = NewQuizResult {
        quiz_id: QuizId::new(1),
        user_id: UserId::new(7),
        quiz_title: "Quiz 1".into(),
        score: 1,
        max_score: 3,
        details: vec![detail.clone()],
        completed_at: fixed_now() - Duration::hours(1),
    };
    let older = repo.save_result(&base).await.unwrap();
    let newer = repo
        .save_result(&NewQuizResult {
            score: 3,
            completed_at: fixed_now(),
            ..base.clone()
        })
        .await
        .unwrap();
    repo.save_result(&NewQuizResult {
        user_id: UserId::new(8),
        ..base.clone()
    })
    .await
    .unwrap();

    let mine = repo.list_results_for_user(UserId::new(7), 10).await.unwrap();
    let ids: Vec<_> = mine.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![newer, older]);
    assert_eq!(mine[0].percentage(), 100);

    assert_eq!(repo.list_all_results(10).await.unwrap().len(), 3);
    assert_eq!(repo.result_details(older).await.unwrap(), vec![detail]);
}

#[tokio::test]
async fn sqlite_session_store_is_scoped_and_clearable() {
    let repo = connect("memdb_sessions").await;
    let alice = repo.session_store(UserId::new(1));
    let bob = repo.session_store(UserId::new(2));
    let quiz = QuizId::new(4);

    let started = fixed_now() - Duration::minutes(3);
    alice.save(quiz, &PersistedSession::fresh(started)).await.unwrap();

    let restored = alice.load(quiz).await.unwrap().expect("stored");
    assert_eq!(restored.started_at, started);
    assert!(bob.load(quiz).await.unwrap().is_none());

    alice.clear(quiz).await.unwrap();
    assert!(alice.load(quiz).await.unwrap().is_none());
}
