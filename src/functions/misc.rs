//! Identity strings, time handling, vectors, headings, grid addressing, and
//! host-backed queries.

use super::{atof, atoi, fmt_float, fun, list_words, match_thing, sep_arg, FuncMap, FN_VARARGS};
use crate::db::fmt_dbref;
use crate::error::{ERR_INVALID_GRID, ERR_VECTOR_DIMENSIONS};
use crate::eval::EvalContext;

pub fn fun_version(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str(&ctx.version.clone());
}

pub fn fun_mudname(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str(&ctx.mudname.clone());
}

// ============================================================================
// Time
// ============================================================================

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// Civil-date conversion on days since 1970-01-01 (Gregorian, proleptic).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Seconds since the epoch to the canonical `Ddd Mmm DD HH:MM:SS YYYY`.
pub fn format_time(secs: i64) -> String {
    let days = secs.div_euclid(86_400);
    let tod = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    let weekday = (days + 4).rem_euclid(7) as usize;
    format!(
        "{} {} {:02} {:02}:{:02}:{:02} {}",
        DAY_NAMES[weekday],
        MONTH_NAMES[(month - 1) as usize],
        day,
        tod / 3600,
        (tod / 60) % 60,
        tod % 60,
        year
    )
}

fn month_number(name: &str) -> Option<i64> {
    MONTH_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|p| p as i64 + 1)
}

fn parse_hms(text: &str) -> Option<(i64, i64, i64)> {
    let mut parts = text.split(':');
    let h = parts.next()?.parse().ok()?;
    let m = parts.next()?.parse().ok()?;
    let s = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(0..24).contains(&h) || !(0..60).contains(&m) || !(0..62).contains(&s) {
        return None;
    }
    Some((h, m, s))
}

/// Parse the canonical format and the two common RFC-1123 shapes, yielding
/// seconds since the epoch, or None.
pub fn parse_time(text: &str) -> Option<i64> {
    let words: Vec<&str> = text.split_whitespace().collect();
    // Mon Jan 02 15:04:05 2006
    if words.len() == 5 && !words[0].ends_with(',') {
        let month = month_number(words[1])?;
        let day: i64 = words[2].parse().ok()?;
        let (h, m, s) = parse_hms(words[3])?;
        let year: i64 = words[4].parse().ok()?;
        if !(1..=31).contains(&day) {
            return None;
        }
        return Some(days_from_civil(year, month, day) * 86_400 + h * 3600 + m * 60 + s);
    }
    // Mon, 02 Jan 2006 15:04:05 GMT  /  Mon, 02 Jan 2006 15:04:05 +0000
    if words.len() == 6 && words[0].ends_with(',') {
        let day: i64 = words[1].parse().ok()?;
        let month = month_number(words[2])?;
        let year: i64 = words[3].parse().ok()?;
        let (h, m, s) = parse_hms(words[4])?;
        if !(1..=31).contains(&day) {
            return None;
        }
        let offset = match words[5] {
            "GMT" | "UT" | "UTC" | "+0000" | "-0000" => 0,
            zone => {
                let sign = if zone.starts_with('-') { -1 } else { 1 };
                let digits = zone.trim_start_matches(['+', '-']);
                if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let hours: i64 = digits[..2].parse().ok()?;
                let mins: i64 = digits[2..].parse().ok()?;
                sign * (hours * 3600 + mins * 60)
            }
        };
        return Some(
            days_from_civil(year, month, day) * 86_400 + h * 3600 + m * 60 + s - offset,
        );
    }
    None
}

pub fn fun_time(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str(&format_time(ctx.host.now_secs()));
}

pub fn fun_secs(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    out.push_str(&ctx.host.now_secs().to_string());
}

pub fn fun_convsecs(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&format_time(atoi(&args[0])));
}

pub fn fun_convtime(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    match parse_time(&args[0]) {
        Some(secs) => out.push_str(&secs.to_string()),
        None => out.push_str("-1"),
    }
}

// ============================================================================
// Vectors
// ============================================================================

fn vector(arg: &str, sep: &str) -> Vec<f64> {
    list_words(arg, sep).iter().map(|w| atof(w)).collect()
}

fn push_vector(out: &mut String, v: &[f64], sep: &str) {
    let words: Vec<String> = v.iter().map(|x| fmt_float(*x)).collect();
    out.push_str(&words.join(sep));
}

/// vadd(v1, v2[, sep])
pub fn fun_vadd(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let (a, b) = (vector(&args[0], &sep), vector(&args[1], &sep));
    if a.len() != b.len() {
        out.push_str(ERR_VECTOR_DIMENSIONS);
        return;
    }
    let sum: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
    push_vector(out, &sum, &sep);
}

pub fn fun_vsub(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let (a, b) = (vector(&args[0], &sep), vector(&args[1], &sep));
    if a.len() != b.len() {
        out.push_str(ERR_VECTOR_DIMENSIONS);
        return;
    }
    let diff: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
    push_vector(out, &diff, &sep);
}

/// vsmul(vector, scalar[, sep])
pub fn fun_vsmul(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let k = atof(&args[1]);
    let scaled: Vec<f64> = vector(&args[0], &sep).iter().map(|x| x * k).collect();
    push_vector(out, &scaled, &sep);
}

pub fn fun_vdot(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 2 {
        return;
    }
    let sep = sep_arg(args, 2);
    let (a, b) = (vector(&args[0], &sep), vector(&args[1], &sep));
    if a.len() != b.len() {
        out.push_str(ERR_VECTOR_DIMENSIONS);
        return;
    }
    let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
    out.push_str(&fmt_float(dot));
}

pub fn fun_vmag(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 1 {
        return;
    }
    let sep = sep_arg(args, 1);
    let mag: f64 = vector(&args[0], &sep).iter().map(|x| x * x).sum::<f64>().sqrt();
    out.push_str(&fmt_float(mag));
}

pub fn fun_vunit(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 1 {
        return;
    }
    let sep = sep_arg(args, 1);
    let v = vector(&args[0], &sep);
    let mag: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if mag == 0.0 {
        push_vector(out, &v, &sep);
        return;
    }
    let unit: Vec<f64> = v.iter().map(|x| x / mag).collect();
    push_vector(out, &unit, &sep);
}

pub fn fun_vdim(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 1 {
        return;
    }
    let sep = sep_arg(args, 1);
    out.push_str(&vector(&args[0], &sep).len().to_string());
}

// ============================================================================
// Headings and Grid Addressing
// ============================================================================

const COMPASS_POINTS: f64 = 32.0;

/// hvec(heading): unit vector for a 32-point compass heading, `x y` with
/// north as +y.
pub fn fun_hvec(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let heading = atoi(&args[0]).rem_euclid(32) as f64;
    let theta = heading * std::f64::consts::TAU / COMPASS_POINTS;
    out.push_str(&format!("{} {}", fmt_float(theta.sin()), fmt_float(theta.cos())));
}

/// vec2h(vector): nearest compass point for an `x y` vector.
pub fn fun_vec2h(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.len() < 1 {
        return;
    }
    let v = vector(&args[0], &sep_arg(args, 1));
    if v.len() != 2 {
        out.push_str(ERR_VECTOR_DIMENSIONS);
        return;
    }
    let theta = v[0].atan2(v[1]);
    let point = (theta / (std::f64::consts::TAU / COMPASS_POINTS)).round() as i64;
    out.push_str(&point.rem_euclid(32).to_string());
}

const GRID_DIM: i64 = 1000;

/// gridabs(l, n, q): absolute index of a grid cell.
pub fn fun_gridabs(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let (l, n, q) = (atoi(&args[0]), atoi(&args[1]), atoi(&args[2]));
    if !(0..GRID_DIM).contains(&l) || !(0..GRID_DIM).contains(&n) || !(0..GRID_DIM).contains(&q) {
        out.push_str(ERR_INVALID_GRID);
        return;
    }
    out.push_str(&((l * GRID_DIM + n) * GRID_DIM + q).to_string());
}

/// absgrid(abs): the `L-N-Q` form of an absolute grid index.
pub fn fun_absgrid(_ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let abs = atoi(&args[0]);
    if !(0..GRID_DIM * GRID_DIM * GRID_DIM).contains(&abs) {
        out.push_str(ERR_INVALID_GRID);
        return;
    }
    let q = abs % GRID_DIM;
    let n = (abs / GRID_DIM) % GRID_DIM;
    let l = abs / (GRID_DIM * GRID_DIM);
    out.push_str(&format!("{}-{}-{}", l, n, q));
}

// ============================================================================
// Host Queries
// ============================================================================

pub fn fun_lwho(ctx: &mut EvalContext, _args: &[String], out: &mut String) {
    let viewer = ctx.executor;
    let refs: Vec<String> = ctx
        .host
        .players_online(viewer)
        .iter()
        .map(|d| fmt_dbref(*d))
        .collect();
    out.push_str(&refs.join(" "));
}

pub fn fun_conn(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match_thing(ctx, &args[0]);
    out.push_str(&ctx.host.conn_secs(who).to_string());
}

pub fn fun_idle(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match_thing(ctx, &args[0]);
    out.push_str(&ctx.host.idle_secs(who).to_string());
}

pub fn fun_doing(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match_thing(ctx, &args[0]);
    out.push_str(&ctx.host.doing(who));
}

pub fn fun_conn_p(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match_thing(ctx, &args[0]);
    out.push_str(super::bool01(ctx.host.is_connected(who)));
}

/// mail([player]): unread/read/cleared counts.
pub fn fun_mail(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match args.first() {
        Some(spec) if !spec.is_empty() => match_thing(ctx, spec),
        _ => ctx.executor,
    };
    let (unread, read, cleared) = ctx.host.mail_counts(who);
    out.push_str(&format!("{} {} {}", unread, read, cleared));
}

pub fn fun_mailfrom(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match_thing(ctx, &args[0]);
    out.push_str(&fmt_dbref(ctx.host.mail_from(who, atoi(&args[1]))));
}

pub fn fun_mailsubj(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match_thing(ctx, &args[0]);
    out.push_str(&ctx.host.mail_subject(who, atoi(&args[1])));
}

pub fn fun_channels(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    let who = match args.first() {
        Some(spec) if !spec.is_empty() => match_thing(ctx, spec),
        _ => ctx.executor,
    };
    out.push_str(&ctx.host.channels(who).join(" "));
}

/// sql(query[, row-sep[, field-sep]]): host-mediated query.
pub fn fun_sql(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    if args.is_empty() {
        return;
    }
    if !ctx.db.is_wizard(ctx.executor) {
        out.push_str(crate::error::ERR_PERMISSION_DENIED);
        return;
    }
    let row_sep = sep_arg(args, 1);
    let field_sep = sep_arg(args, 2);
    out.push_str(&ctx.host.sql_query(&args[0], &row_sep, &field_sep));
}

pub fn fun_sqlescape(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&ctx.host.sql_escape(&args[0]));
}

pub fn fun_spell(ctx: &mut EvalContext, args: &[String], out: &mut String) {
    out.push_str(&ctx.host.spellcheck(&args[0]).join(" "));
}

pub fn register(map: &mut FuncMap) {
    fun!(map, "VERSION", fun_version, 0);
    fun!(map, "MUDNAME", fun_mudname, 0);
    fun!(map, "TIME", fun_time, 0);
    fun!(map, "SECS", fun_secs, 0);
    fun!(map, "CONVSECS", fun_convsecs, 1);
    fun!(map, "CONVTIME", fun_convtime, 1);
    fun!(map, "VADD", fun_vadd, 0, FN_VARARGS);
    fun!(map, "VSUB", fun_vsub, 0, FN_VARARGS);
    fun!(map, "VSMUL", fun_vsmul, 0, FN_VARARGS);
    fun!(map, "VDOT", fun_vdot, 0, FN_VARARGS);
    fun!(map, "VMAG", fun_vmag, 0, FN_VARARGS);
    fun!(map, "VUNIT", fun_vunit, 0, FN_VARARGS);
    fun!(map, "VDIM", fun_vdim, 0, FN_VARARGS);
    fun!(map, "HVEC", fun_hvec, 1);
    fun!(map, "VEC2H", fun_vec2h, 0, FN_VARARGS);
    fun!(map, "GRIDABS", fun_gridabs, 3);
    fun!(map, "ABSGRID", fun_absgrid, 1);
    fun!(map, "LWHO", fun_lwho, 0);
    fun!(map, "CONN", fun_conn, 1);
    fun!(map, "IDLE", fun_idle, 1);
    fun!(map, "DOING", fun_doing, 1);
    fun!(map, "CONNECTED", fun_conn_p, 1);
    fun!(map, "MAIL", fun_mail, 0, FN_VARARGS);
    fun!(map, "MAILFROM", fun_mailfrom, 2);
    fun!(map, "MAILSUBJ", fun_mailsubj, 2);
    fun!(map, "CHANNELS", fun_channels, 0, FN_VARARGS);
    fun!(map, "SQL", fun_sql, 0, FN_VARARGS);
    fun!(map, "SQLESCAPE", fun_sqlescape, 1);
    fun!(map, "SPELL", fun_spell, 1);
}
