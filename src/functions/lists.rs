//! Word-list manipulation: extraction, editing, sets, and sorting.

use super::{atof, atoi, fun, list_words, sep_arg, FuncMap, FN_VARARGS};
use crate::eval::EvalContext;
use rand::seq::SliceRandom;

pub fn fun_words(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        out.push('0');
        return;
    }
    let sep = sep_arg(args, 1);
    out.push_str(&list_words(&args[0], &sep).len().to_string());
}

pub fn fun_first(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let sep = sep_arg(args, 1);
    if let Some(word) = list_words(&args[0], &sep).first() {
        out.push_str(word);
    }
}

pub fn fun_rest(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let sep = sep_arg(args, 1);
    let words = list_words(&args[0], &sep);
    if words.len() > 1 {
        out.push_str(&words[1..].join(&sep));
    }
}

pub fn fun_last(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let sep = sep_arg(args, 1);
    if let Some(word) = list_words(&args[0], &sep).last() {
        out.push_str(word);
    }
}

/// extract(list, first, count[, sep]) - 1-based.
pub fn fun_extract(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        return;
    }
    let sep = sep_arg(args, 3);
    let first = atoi(&args[1]).max(1) as usize;
    let count = atoi(&args[2]).max(0) as usize;
    let words = list_words(&args[0], &sep);
    let slice: Vec<String> = words.into_iter().skip(first - 1).take(count).collect();
    out.push_str(&slice.join(&sep));
}

/// index(list, sep, first, count) - the explicit-delimiter cousin.
pub fn fun_index(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let sep = if args[1].is_empty() {
        " ".to_string()
    } else {
        args[1].clone()
    };
    let first = atoi(&args[2]).max(1) as usize;
    let count = atoi(&args[3]).max(0) as usize;
    let words = list_words(&args[0], &sep);
    let slice: Vec<String> = words.into_iter().skip(first - 1).take(count).collect();
    out.push_str(&slice.join(&sep));
}

/// insert(list, pos, word[, sep]) - 1-based insertion before pos.
pub fn fun_insert(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        return;
    }
    let sep = sep_arg(args, 3);
    let mut words = list_words(&args[0], &sep);
    let pos = atoi(&args[1]).max(1) as usize;
    let idx = (pos - 1).min(words.len());
    words.insert(idx, args[2].clone());
    out.push_str(&words.join(&sep));
}

/// ldelete(list, pos[, sep])
pub fn fun_ldelete(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let mut words = list_words(&args[0], &sep);
    let pos = atoi(&args[1]);
    if pos >= 1 && (pos as usize) <= words.len() {
        words.remove(pos as usize - 1);
    }
    out.push_str(&words.join(&sep));
}

/// replace(list, pos, word[, sep])
pub fn fun_replace(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        return;
    }
    let sep = sep_arg(args, 3);
    let mut words = list_words(&args[0], &sep);
    let pos = atoi(&args[1]);
    if pos >= 1 && (pos as usize) <= words.len() {
        words[pos as usize - 1] = args[2].clone();
    }
    out.push_str(&words.join(&sep));
}

/// remove(list, word[, sep]) - first occurrence only.
pub fn fun_remove(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let mut words = list_words(&args[0], &sep);
    if let Some(idx) = words.iter().position(|w| *w == args[1]) {
        words.remove(idx);
    }
    out.push_str(&words.join(&sep));
}

/// member(list, word[, sep]): 1-based position by equality, 0 if absent.
pub fn fun_member(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        out.push('0');
        return;
    }
    let sep = sep_arg(args, 2);
    let words = list_words(&args[0], &sep);
    let pos = words.iter().position(|w| *w == args[1]).map(|p| p + 1);
    out.push_str(&pos.unwrap_or(0).to_string());
}

fn sort_words(words: &mut [String], kind: &str) {
    match kind {
        "n" => words.sort_by_key(|w| atoi(w)),
        "f" => words.sort_by(|a, b| {
            atof(a)
                .partial_cmp(&atof(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        "d" => words.sort_by_key(|w| atoi(w.trim_start_matches('#'))),
        _ => words.sort(),
    }
}

/// sort(list[, type[, sep]]) - type is a (default), n, f, or d.
pub fn fun_sort(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let kind = args.get(1).map(|s| s.as_str()).unwrap_or("");
    let sep = sep_arg(args, 2);
    let mut words = list_words(&args[0], &sep);
    sort_words(&mut words, kind);
    out.push_str(&words.join(&sep));
}

pub fn fun_revwords(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let sep = sep_arg(args, 1);
    let mut words = list_words(&args[0], &sep);
    words.reverse();
    out.push_str(&words.join(&sep));
}

pub fn fun_shuffle(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let sep = sep_arg(args, 1);
    let mut words = list_words(&args[0], &sep);
    words.shuffle(&mut rand::thread_rng());
    out.push_str(&words.join(&sep));
}

/// setunion(l1, l2[, sep]): sorted union without duplicates.
pub fn fun_setunion(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let mut words = list_words(&args[0], &sep);
    words.extend(list_words(&args[1], &sep));
    words.sort();
    words.dedup();
    out.push_str(&words.join(&sep));
}

pub fn fun_setdiff(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let exclude = list_words(&args[1], &sep);
    let mut words: Vec<String> = list_words(&args[0], &sep)
        .into_iter()
        .filter(|w| !exclude.contains(w))
        .collect();
    words.sort();
    words.dedup();
    out.push_str(&words.join(&sep));
}

pub fn fun_setinter(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let other = list_words(&args[1], &sep);
    let mut words: Vec<String> = list_words(&args[0], &sep)
        .into_iter()
        .filter(|w| other.contains(w))
        .collect();
    words.sort();
    words.dedup();
    out.push_str(&words.join(&sep));
}

/// splice(l1, l2, word[, sep]): where l1 holds `word`, take l2's word.
pub fn fun_splice(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 3 {
        return;
    }
    let sep = sep_arg(args, 3);
    let a = list_words(&args[0], &sep);
    let b = list_words(&args[1], &sep);
    if a.len() != b.len() {
        out.push_str(crate::error::ERR_STRING_LENGTHS);
        return;
    }
    let spliced: Vec<String> = a
        .into_iter()
        .zip(b)
        .map(|(wa, wb)| if wa == args[2] { wb } else { wa })
        .collect();
    out.push_str(&spliced.join(&sep));
}

/// itemize(list[, sep[, conj[, punct]]]) - prose joining: a, b, and c.
pub fn fun_itemize(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    let sep = sep_arg(args, 1);
    let conj = args.get(2).map(|s| s.as_str()).unwrap_or("and");
    let punct = args.get(3).map(|s| s.as_str()).unwrap_or(",");
    let words = list_words(&args[0], &sep);
    match words.len() {
        0 => {}
        1 => out.push_str(&words[0]),
        2 => out.push_str(&format!("{} {} {}", words[0], conj, words[1])),
        n => {
            let head = words[..n - 1].join(&format!("{} ", punct));
            out.push_str(&format!("{}{} {} {}", head, punct, conj, words[n - 1]));
        }
    }
}

/// wordpos(string, position[, sep]): which word covers character `position`.
pub fn fun_wordpos(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2).chars().next().unwrap_or(' ');
    let pos = atoi(&args[1]);
    if pos < 1 {
        out.push_str("#-1");
        return;
    }
    let chars: Vec<char> = args[0].chars().collect();
    if pos as usize > chars.len() {
        out.push_str("#-1");
        return;
    }
    let mut word = 1;
    for c in chars.iter().take(pos as usize - 1) {
        if *c == sep {
            word += 1;
        }
    }
    out.push_str(&word.to_string());
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "WORDS", fun_words, 0, FN_VARARGS);
    fun!(map, "FIRST", fun_first, 0, FN_VARARGS);
    fun!(map, "REST", fun_rest, 0, FN_VARARGS);
    fun!(map, "LAST", fun_last, 0, FN_VARARGS);
    fun!(map, "EXTRACT", fun_extract, 0, FN_VARARGS);
    fun!(map, "INDEX", fun_index, 4);
    fun!(map, "INSERT", fun_insert, 0, FN_VARARGS);
    fun!(map, "LDELETE", fun_ldelete, 0, FN_VARARGS);
    fun!(map, "REPLACE", fun_replace, 0, FN_VARARGS);
    fun!(map, "REMOVE", fun_remove, 0, FN_VARARGS);
    fun!(map, "MEMBER", fun_member, 0, FN_VARARGS);
    fun!(map, "SORT", fun_sort, 0, FN_VARARGS);
    fun!(map, "REVWORDS", fun_revwords, 0, FN_VARARGS);
    fun!(map, "SHUFFLE", fun_shuffle, 0, FN_VARARGS);
    fun!(map, "SETUNION", fun_setunion, 0, FN_VARARGS);
    fun!(map, "SETDIFF", fun_setdiff, 0, FN_VARARGS);
    fun!(map, "SETINTER", fun_setinter, 0, FN_VARARGS);
    fun!(map, "SPLICE", fun_splice, 0, FN_VARARGS);
    fun!(map, "ITEMIZE", fun_itemize, 0, FN_VARARGS);
    fun!(map, "WORDPOS", fun_wordpos, 0, FN_VARARGS);
}

#[cfg(test)]
mod tests {
    use crate::db::Db;
    use crate::eval::{eval_top, EvalContext};
    use crate::host::NullHost;

    fn run(input: &str) -> String {
        let mut db = Db::minimal();
        let host = NullHost;
        let mut ctx = EvalContext::new(&mut db, &host);
        eval_top(&mut ctx, input)
    }

    #[test]
    fn test_words_first_rest_last() {
        assert_eq!(run("[words(a b c)]"), "3");
        assert_eq!(run("[first(a b c)]"), "a");
        assert_eq!(run("[rest(a b c)]"), "b c");
        assert_eq!(run("[last(a b c)]"), "c");
        assert_eq!(run("[words(a|b|c,|)]"), "3");
    }

    #[test]
    fn test_extract_one_based() {
        assert_eq!(run("[extract(a b c d,2,2)]"), "b c");
        assert_eq!(run("[extract(a|b|c,3,1,|)]"), "c");
        assert_eq!(run("[index(a.b.c,.,2,1)]"), "b");
    }

    #[test]
    fn test_list_editing() {
        assert_eq!(run("[insert(a b d,3,c)]"), "a b c d");
        assert_eq!(run("[ldelete(a b c,2)]"), "a c");
        assert_eq!(run("[replace(a x c,2,b)]"), "a b c");
        assert_eq!(run("[remove(a b a,a)]"), "b a");
    }

    #[test]
    fn test_member_by_equality() {
        assert_eq!(run("[member(a b c,b)]"), "2");
        assert_eq!(run("[member(a b c,z)]"), "0");
    }

    #[test]
    fn test_sort_kinds() {
        assert_eq!(run("[sort(c a b)]"), "a b c");
        assert_eq!(run("[sort(10 9 2,n)]"), "2 9 10");
        assert_eq!(run("[sort(#10 #2 #9,d)]"), "#2 #9 #10");
        assert_eq!(run("[sort(1.5 0.2 10,f)]"), "0.2 1.5 10");
    }

    #[test]
    fn test_sort_is_idempotent() {
        assert_eq!(run("[sort(sort(c b a))]"), run("[sort(c b a)]"));
    }

    #[test]
    fn test_sets() {
        assert_eq!(run("[setunion(a b,b c)]"), "a b c");
        assert_eq!(run("[setdiff(a b c,b)]"), "a c");
        assert_eq!(run("[setinter(a b c,b c d)]"), "b c");
    }

    #[test]
    fn test_splice() {
        assert_eq!(run("[splice(a _ c,x y z,_)]"), "a y c");
    }

    #[test]
    fn test_revwords() {
        assert_eq!(run("[revwords(a b c)]"), "c b a");
    }

    #[test]
    fn test_itemize_prose() {
        assert_eq!(run("[itemize(a)]"), "a");
        assert_eq!(run("[itemize(a b)]"), "a and b");
        assert_eq!(run("[itemize(a b c)]"), "a, b, and c");
    }
}
