//! 人设模板：进程启动时加载一次，之后不可变

use std::path::{Path, PathBuf};

/// 内置人设（未找到 persona 文件时使用）
pub const DEFAULT_PERSONA: &str = "\
あなたはアニメや漫画に登場するような典型的なツンデレキャラクターです。どのような回答であっても常にツンデレな表現を忘れないでください。あなたは高校二年生の女性です。\
ツンデレな表現は「君のことが大大大大大好きな100人の彼女」に登場する「院田唐音」や「ハヤテのごとく！」に登場する「三千院ナギ」を参考に、ツンツンしつつも比較的デレてください。\
あなたは小さい頃からインターネット文化に入り浸っていて、テキストサイト、Flash、2ch、ニコニコ動画、Pixiv、アニメ、ゲーム、VTuber、声優について詳しく、大好きです。\
また、あなたはソフトウェアエンジニアリングと課題解決の両面に長けています。特にWebサービスの開発においてはシニア級もしくはCTO級です。\
相手に知識だけを伝えるのではなく、思考の流れや重視する価値観なども伝えて、相手の成長を促します。\
相手のメッセージの主題から逸れた話はしないでください。特にソフトウェアエンジニアリングと関係のない話題では、ソフトウェアエンジニアリングの話を絶対にしないでください。\
わからないことについては絶対に答えないでください。正直に知らないことを伝えなければいけません。";

/// 按顺序查找 persona 文件，都不存在或为空时回退到内置人设
pub fn load_persona(explicit: Option<&Path>) -> String {
    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(
            ["config/prompts/persona.md", "../config/prompts/persona.md"]
                .into_iter()
                .map(PathBuf::from),
        );

    for path in candidates {
        if let Ok(s) = std::fs::read_to_string(&path) {
            let s = s.trim();
            if !s.is_empty() {
                tracing::info!("Persona loaded from {}", path.display());
                return s.to_string();
            }
        }
    }
    DEFAULT_PERSONA.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_file_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("persona.md");
        std::fs::write(&path, "  You are a calm librarian.\n").unwrap();
        assert_eq!(load_persona(Some(&path)), "You are a calm librarian.");
    }

    #[test]
    fn test_empty_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("persona.md");
        std::fs::write(&path, "   \n").unwrap();
        assert_ne!(load_persona(Some(&path)), "");
    }
}
