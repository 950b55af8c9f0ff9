//! Prompt construction for generation tasks.

use std::fmt::Write as _;

use jugo_types::generation::GenerationRequest;
use jugo_types::llm::{CompletionRequest, Message};
use jugo_types::work::{Chapter, Work, WorkType};

use crate::service::text::plain_text;

const TEMPERATURE: f64 = 0.7;

/// Build the provider request for `request`.
///
/// `chapters` is only read by the conversion kinds, which feed the whole
/// manuscript to the model; callers may pass an empty slice otherwise.
pub fn build_prompt(request: &GenerationRequest, work: &Work, chapters: &[Chapter]) -> CompletionRequest {
    let (system, user) = match request {
        GenerationRequest::Continue(r) => {
            let writer = match r.work_type {
                WorkType::Novel => "novelist",
                WorkType::Screenplay => "screenwriter",
            };
            let mut prompt = format!(
                "Continue the {} below.\n\nPrevious text:\n{}\n\n\
                 Write about {} characters. Keep the voice, tense and point of view consistent.",
                r.work_type, r.context, r.length
            );
            push_hint(&mut prompt, "Style", r.style.as_deref());
            prompt.push_str("\nOutput only the continuation.");
            (format!("You are an experienced {writer}."), prompt)
        }
        GenerationRequest::Polish(r) => {
            let mut prompt = format!(
                "Polish the following passage. Fix grammar and awkward phrasing and tighten the prose \
                 without changing its meaning or plot.\n\n{}",
                r.content
            );
            push_hint(&mut prompt, "Style", r.style.as_deref());
            prompt.push_str("\nOutput only the polished passage.");
            ("You are a meticulous fiction editor.".to_string(), prompt)
        }
        GenerationRequest::Expand(r) => {
            let mut prompt = format!(
                "Expand the following passage to roughly {} characters. Add sensory detail, \
                 inner thought and dialogue where it fits.\n\n{}",
                r.length, r.content
            );
            push_hint(&mut prompt, "Focus on", r.focus.as_deref());
            prompt.push_str("\nOutput only the expanded passage.");
            ("You are an experienced novelist.".to_string(), prompt)
        }
        GenerationRequest::Rewrite(r) => {
            let mut prompt = format!("Rewrite the following passage.\n\n{}", r.content);
            push_hint(&mut prompt, "Target style", r.style.as_deref());
            push_hint(&mut prompt, "Tone", r.tone.as_deref());
            prompt.push_str("\nKeep the events intact. Output only the rewritten passage.");
            ("You are a versatile fiction writer.".to_string(), prompt)
        }
        GenerationRequest::Outline(r) => {
            let mut prompt = format!(
                "Plan a {} story about: {}\n\nProduce:\n\
                 1. A synopsis of 200 to 300 words.\n\
                 2. An outline of {} chapters, each with a title and a short summary.\n\
                 3. Two or three main characters with a line on each.\n\
                 4. Three to five key plot points.",
                r.genre, r.topic, r.num_chapters
            );
            push_hint(&mut prompt, "Style", r.style.as_deref());
            (format!("You are a {} story planner.", r.genre), prompt)
        }
        GenerationRequest::NovelToScreenplay(r) => {
            let mut prompt = format!("Adapt the novel \"{}\" into a screenplay.", work.title);
            if let Some(minutes) = r.target_duration {
                let _ = write!(prompt, "\nTarget running time: about {minutes} minutes.");
            }
            if let Some(scenes) = r.num_scenes {
                let _ = write!(prompt, "\nAim for {scenes} scenes.");
            }
            prompt.push_str(
                "\nUse standard screenplay format with INT./EXT. scene headings, action lines and dialogue.",
            );
            push_manuscript(&mut prompt, chapters);
            ("You are a professional screenwriter.".to_string(), prompt)
        }
        GenerationRequest::ScreenplayToNovel(r) => {
            let mut prompt = format!("Turn the screenplay \"{}\" into a novel.", work.title);
            if let Some(count) = r.num_chapters {
                let _ = write!(prompt, "\nSplit it into {count} chapters.");
            }
            if let Some(words) = r.word_per_chapter {
                let _ = write!(prompt, "\nWrite about {words} words per chapter.");
            }
            prompt.push_str("\nRender scene directions as narration and keep all dialogue.");
            push_manuscript(&mut prompt, chapters);
            ("You are an experienced novelist.".to_string(), prompt)
        }
    };

    CompletionRequest {
        model: String::new(),
        messages: vec![Message::user(user)],
        system: Some(system),
        max_tokens: request.max_tokens(),
        temperature: Some(TEMPERATURE),
    }
}

fn push_hint(prompt: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        let _ = write!(prompt, "\n{label}: {value}");
    }
}

fn push_manuscript(prompt: &mut String, chapters: &[Chapter]) {
    prompt.push_str("\n\nSource text:\n");
    for chapter in chapters {
        let _ = write!(prompt, "\n## {}\n{}\n", chapter.title, plain_text(&chapter.content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jugo_types::generation::{
        ContinueRequest, NovelToScreenplayRequest, OutlineRequest, RewriteRequest,
    };
    use jugo_types::work::{ChapterId, UserId, WorkId};

    fn work(work_type: WorkType) -> Work {
        Work {
            id: WorkId(7),
            user_id: UserId(1),
            work_type,
            title: "Harbor Lights".into(),
            words: 0,
            num_chapters: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn chapter(id: i64, title: &str, content: &str) -> Chapter {
        Chapter {
            id: ChapterId(id),
            work_id: WorkId(7),
            title: title.into(),
            content: content.into(),
            words: 0,
            order_num: id,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn continue_prompt_carries_context_and_budget() {
        let request = GenerationRequest::Continue(ContinueRequest {
            work_id: WorkId(7),
            work_type: WorkType::Screenplay,
            context: "FADE IN:".into(),
            length: 600,
            style: Some("noir".into()),
        });
        let built = build_prompt(&request, &work(WorkType::Screenplay), &[]);

        assert_eq!(built.max_tokens, 600);
        assert!(built.system.unwrap().contains("screenwriter"));
        let text = &built.messages[0].content;
        assert!(text.contains("FADE IN:"));
        assert!(text.contains("600 characters"));
        assert!(text.contains("Style: noir"));
    }

    #[test]
    fn blank_hints_are_left_out() {
        let request = GenerationRequest::Rewrite(RewriteRequest {
            work_id: WorkId(7),
            content: "She left.".into(),
            style: Some("  ".into()),
            tone: None,
        });
        let built = build_prompt(&request, &work(WorkType::Novel), &[]);
        let text = &built.messages[0].content;
        assert!(!text.contains("Target style"));
        assert!(!text.contains("Tone"));
        assert_eq!(built.max_tokens, 4096);
    }

    #[test]
    fn outline_prompt_names_genre_and_chapters() {
        let request = GenerationRequest::Outline(OutlineRequest {
            work_id: WorkId(7),
            topic: "a lighthouse keeper who hears voices".into(),
            genre: "gothic".into(),
            num_chapters: 12,
            style: None,
        });
        let built = build_prompt(&request, &work(WorkType::Novel), &[]);
        assert!(built.system.unwrap().contains("gothic"));
        assert!(built.messages[0].content.contains("12 chapters"));
    }

    #[test]
    fn conversion_includes_plain_text_of_every_chapter() {
        let request = GenerationRequest::NovelToScreenplay(NovelToScreenplayRequest {
            work_id: WorkId(7),
            target_duration: Some(90),
            num_scenes: None,
        });
        let chapters = [
            chapter(1, "Arrival", "<p>The ferry docked.</p>"),
            chapter(2, "Storm", "<p>Wind&nbsp;rose.</p>"),
        ];
        let built = build_prompt(&request, &work(WorkType::Novel), &chapters);

        let text = &built.messages[0].content;
        assert!(text.contains("Harbor Lights"));
        assert!(text.contains("90 minutes"));
        assert!(text.contains("## Arrival\nThe ferry docked."));
        assert!(text.contains("## Storm\nWind rose."));
        assert!(!text.contains("<p>"));
        assert_eq!(built.max_tokens, 8192);
    }
}
