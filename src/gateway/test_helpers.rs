//! Scriptable in-memory gateway for manager tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::types::{
    AuthReply, AuthUser, ChatReply, ChatRequest, Course, CourseChapter, CourseList, CourseReply, CourseRequest,
    CourseStatus, CourseSummary, Credentials, Doubt, DoubtList, GenerateCourseReply, GenerateReply, HomeworkSet,
    ProfileReply, ProfileUser, Registration, SubmitReply, SubmitRequest,
};
use super::{AuthGateway, CourseGateway, GatewayError, TutorGateway};
use crate::state::homework::{ChapterProgress, HomeworkProblem};

/// Everything the mock was asked to do, in call order.
#[derive(Debug, Default)]
pub struct Calls {
    pub chat: Vec<ChatRequest>,
    pub fetch_homework: usize,
    pub generate_homework: usize,
    pub submit: Vec<SubmitRequest>,
    pub fetch_doubts: usize,
    pub sign_in: Vec<Credentials>,
    pub sign_up: Vec<Registration>,
    pub list_courses: usize,
    pub generate_course: Vec<CourseRequest>,
    pub fetch_course: Vec<String>,
    pub fetch_profile: usize,
}

impl Calls {
    #[must_use]
    pub fn hint_requests(&self) -> usize {
        self.submit.iter().filter(|r| r.request_hint).count()
    }

    #[must_use]
    pub fn solution_submissions(&self) -> usize {
        self.submit.iter().filter(|r| !r.request_hint).count()
    }
}

/// Queued replies are consumed first; once a queue is empty the mock falls
/// back to a benign default.
#[derive(Default)]
pub struct MockGateway {
    pub calls: Mutex<Calls>,
    pub chat_replies: Mutex<VecDeque<Result<ChatReply, GatewayError>>>,
    pub homework_sets: Mutex<VecDeque<Result<HomeworkSet, GatewayError>>>,
    pub default_problems: Mutex<Vec<HomeworkProblem>>,
    pub submit_replies: Mutex<VecDeque<Result<SubmitReply, GatewayError>>>,
    pub doubt_lists: Mutex<VecDeque<Result<DoubtList, GatewayError>>>,
    pub auth_replies: Mutex<VecDeque<Result<AuthReply, GatewayError>>>,
    pub course_lists: Mutex<VecDeque<Result<CourseList, GatewayError>>>,
    pub course_replies: Mutex<VecDeque<Result<CourseReply, GatewayError>>>,
    pub profiles: Mutex<VecDeque<Result<ProfileReply, GatewayError>>>,
    /// When set, chat calls park until the test calls `notify_one`.
    pub chat_gate: Option<Arc<Notify>>,
    /// Same, for homework submissions and hint requests.
    pub submit_gate: Option<Arc<Notify>>,
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_problems(problems: Vec<HomeworkProblem>) -> Self {
        let mock = Self::default();
        *mock.default_problems.lock().unwrap() = problems;
        mock
    }

    #[must_use]
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self { chat_gate: Some(gate), ..Self::default() }
    }

    #[must_use]
    pub fn gated_submit(problems: Vec<HomeworkProblem>, gate: Arc<Notify>) -> Self {
        let mock = Self::with_problems(problems);
        Self { submit_gate: Some(gate), ..mock }
    }

    pub fn push_chat(&self, reply: Result<ChatReply, GatewayError>) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_homework(&self, set: Result<HomeworkSet, GatewayError>) {
        self.homework_sets.lock().unwrap().push_back(set);
    }

    pub fn push_submit(&self, reply: Result<SubmitReply, GatewayError>) {
        self.submit_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_doubts(&self, list: Result<DoubtList, GatewayError>) {
        self.doubt_lists.lock().unwrap().push_back(list);
    }

    pub fn push_auth(&self, reply: Result<AuthReply, GatewayError>) {
        self.auth_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_courses(&self, list: Result<CourseList, GatewayError>) {
        self.course_lists.lock().unwrap().push_back(list);
    }

    pub fn push_course(&self, reply: Result<CourseReply, GatewayError>) {
        self.course_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_profile(&self, reply: Result<ProfileReply, GatewayError>) {
        self.profiles.lock().unwrap().push_back(reply);
    }
}

// =========================================================================
// Fixtures
// =========================================================================

#[must_use]
pub fn problem(id: &str, hints: &[&str]) -> HomeworkProblem {
    HomeworkProblem {
        id: id.to_owned(),
        title: format!("Problem {id}"),
        description: "Solve it".to_owned(),
        difficulty: crate::state::homework::Difficulty::Medium,
        hints: hints.iter().map(|h| (*h).to_owned()).collect(),
        is_solved: false,
        user_attempts: 0,
    }
}

#[must_use]
pub fn homework_set(problems: Vec<HomeworkProblem>) -> HomeworkSet {
    let progress = ChapterProgress::from_problems(&problems);
    HomeworkSet { success: true, problems, progress: Some(progress) }
}

#[must_use]
pub fn course_summary(id: &str, title: &str, is_completed: bool) -> CourseSummary {
    CourseSummary {
        id: id.to_owned(),
        title: title.to_owned(),
        topic: title.to_lowercase(),
        description: None,
        difficulty: Some("Beginner".to_owned()),
        category: None,
        language: None,
        duration: Some(4),
        status: CourseStatus::Ready,
        is_completed,
        progress: if is_completed { 100.0 } else { 0.0 },
        total_chapters: 2,
        completed_chapters: if is_completed { 2 } else { 0 },
    }
}

#[must_use]
pub fn course_chapter(id: &str, title: &str, notes: Option<&str>) -> CourseChapter {
    CourseChapter {
        id: id.to_owned(),
        chapter_number: 1,
        title: title.to_owned(),
        description: None,
        ai_generated_notes: notes.map(str::to_owned),
        topics: Vec::new(),
        duration_minutes: None,
        homework_progress: None,
    }
}

#[must_use]
pub fn course(id: &str, chapters: Vec<CourseChapter>) -> CourseReply {
    CourseReply {
        success: true,
        course: Course {
            id: id.to_owned(),
            title: format!("Course {id}"),
            topic: String::new(),
            description: None,
            difficulty: None,
            language: None,
            duration: None,
            status: CourseStatus::Ready,
            overall_progress: 0.0,
            chapters,
        },
    }
}

#[must_use]
pub fn chat_reply(text: &str) -> ChatReply {
    ChatReply { success: true, response: text.to_owned(), timestamp: Some("2026-01-01T00:00:00Z".to_owned()) }
}

#[must_use]
pub fn graded(is_correct: bool, feedback: &str) -> SubmitReply {
    SubmitReply {
        success: true,
        is_correct,
        feedback: Some(feedback.to_owned()),
        score: Some(if is_correct { 100.0 } else { 30.0 }),
        suggestions: None,
        attempts: Some(1),
        hint: None,
    }
}

#[must_use]
pub fn hint_reply(hint: &str) -> SubmitReply {
    SubmitReply {
        success: true,
        is_correct: false,
        feedback: None,
        score: None,
        suggestions: None,
        attempts: None,
        hint: Some(hint.to_owned()),
    }
}

#[must_use]
pub fn doubt(id: &str, question: &str) -> Doubt {
    Doubt { id: id.to_owned(), question: question.to_owned(), answer: "because".to_owned(), created_at: None }
}

// =========================================================================
// Trait impls
// =========================================================================

#[async_trait::async_trait]
impl TutorGateway for MockGateway {
    async fn send_chat_message(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError> {
        self.calls.lock().unwrap().chat.push(request.clone());
        if let Some(gate) = &self.chat_gate {
            gate.notified().await;
        }
        let next = self.chat_replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(chat_reply("ok")))
    }

    async fn fetch_homework(&self, _chapter_id: &str) -> Result<HomeworkSet, GatewayError> {
        self.calls.lock().unwrap().fetch_homework += 1;
        let next = self.homework_sets.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(homework_set(self.default_problems.lock().unwrap().clone())))
    }

    async fn generate_homework(&self, _chapter_id: &str) -> Result<GenerateReply, GatewayError> {
        self.calls.lock().unwrap().generate_homework += 1;
        Ok(GenerateReply { success: true })
    }

    async fn submit_homework(&self, _chapter_id: &str, request: &SubmitRequest) -> Result<SubmitReply, GatewayError> {
        self.calls.lock().unwrap().submit.push(request.clone());
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        let next = self.submit_replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(graded(false, "try again")))
    }

    async fn fetch_doubts(&self, _chapter_id: &str) -> Result<DoubtList, GatewayError> {
        self.calls.lock().unwrap().fetch_doubts += 1;
        let next = self.doubt_lists.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(DoubtList { success: true, doubts: Vec::new() }))
    }
}

#[async_trait::async_trait]
impl CourseGateway for MockGateway {
    async fn list_courses(&self) -> Result<CourseList, GatewayError> {
        self.calls.lock().unwrap().list_courses += 1;
        let next = self.course_lists.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(CourseList { success: true, courses: Vec::new() }))
    }

    async fn generate_course(&self, request: &CourseRequest) -> Result<GenerateCourseReply, GatewayError> {
        self.calls.lock().unwrap().generate_course.push(request.clone());
        let mut course = course_summary("new", &request.topic, false);
        course.status = CourseStatus::Generating;
        Ok(GenerateCourseReply { success: true, course })
    }

    async fn fetch_course(&self, course_id: &str) -> Result<CourseReply, GatewayError> {
        self.calls.lock().unwrap().fetch_course.push(course_id.to_owned());
        let next = self.course_replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(course(course_id, Vec::new())))
    }

    async fn fetch_profile(&self) -> Result<ProfileReply, GatewayError> {
        self.calls.lock().unwrap().fetch_profile += 1;
        let next = self.profiles.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(ProfileReply {
                success: true,
                user: ProfileUser {
                    id: "u1".to_owned(),
                    name: "Asha".to_owned(),
                    username: None,
                    email: "asha@example.test".to_owned(),
                    created_at: None,
                },
                courses: Vec::new(),
            })
        })
    }
}

#[async_trait::async_trait]
impl AuthGateway for MockGateway {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthReply, GatewayError> {
        self.calls.lock().unwrap().sign_in.push(credentials.clone());
        let next = self.auth_replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(auth_reply("token-in", &credentials.email)))
    }

    async fn sign_up(&self, registration: &Registration) -> Result<AuthReply, GatewayError> {
        self.calls.lock().unwrap().sign_up.push(registration.clone());
        let next = self.auth_replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(auth_reply("token-up", &registration.email)))
    }
}

#[must_use]
pub fn auth_reply(token: &str, email: &str) -> AuthReply {
    AuthReply {
        success: true,
        token: token.to_owned(),
        user: AuthUser { id: "u1".to_owned(), name: "Asha".to_owned(), email: email.to_owned() },
    }
}
