//! Upcoming-birthday lookup.
//!
//! The window is `[today, today + WINDOW_DAYS]`, both ends inclusive. A
//! birthday is matched on month and day only; the year it is observed in is
//! the first one in which it falls on or after `today`, so windows that cross
//! a month or a year boundary behave like any other. Feb 29 birthdays are
//! observed on Feb 28 in non-leap years.

use time::{util::is_leap_year, Date, Duration, Month};
use uuid::Uuid;

use super::repo::{month_day_code, Contact, ContactStore};

pub const WINDOW_DAYS: i64 = 7;

/// Month/day codes of every day in the window, used as the store-side
/// pre-filter. Includes Feb 29 when the window covers Feb 28 of a non-leap
/// year.
pub fn window_codes(today: Date) -> Vec<i32> {
    let mut codes = Vec::with_capacity(WINDOW_DAYS as usize + 2);
    for offset in 0..=WINDOW_DAYS {
        let day = today + Duration::days(offset);
        codes.push(month_day_code(day));
        if day.month() == Month::February && day.day() == 28 && !is_leap_year(day.year()) {
            codes.push(229);
        }
    }
    codes
}

/// The date `birthday` is celebrated on in `year`.
pub fn observed_in(birthday: Date, year: i32) -> Option<Date> {
    Date::from_calendar_date(year, birthday.month(), birthday.day())
        .or_else(|_| Date::from_calendar_date(year, Month::February, 28))
        .ok()
}

/// First observed birthday on or after `today`.
pub fn next_occurrence(birthday: Date, today: Date) -> Option<Date> {
    let this_year = observed_in(birthday, today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        observed_in(birthday, today.year() + 1)
    }
}

/// Keeps the contacts whose next birthday lands inside the window, ordered
/// by that date, then by name.
pub fn upcoming(today: Date, candidates: Vec<Contact>) -> Vec<Contact> {
    let last = today + Duration::days(WINDOW_DAYS);
    let mut hits: Vec<(Date, Contact)> = candidates
        .into_iter()
        .filter_map(|c| {
            let next = next_occurrence(c.birthday, today)?;
            (next <= last).then_some((next, c))
        })
        .collect();
    hits.sort_by(|(a, ca), (b, cb)| {
        a.cmp(b)
            .then_with(|| ca.last_name.cmp(&cb.last_name))
            .then_with(|| ca.first_name.cmp(&cb.first_name))
    });
    hits.into_iter().map(|(_, c)| c).collect()
}

pub async fn upcoming_birthdays(
    store: &dyn ContactStore,
    user_id: Uuid,
    today: Date,
) -> anyhow::Result<Vec<Contact>> {
    let candidates = store
        .by_birthday_codes(user_id, &window_codes(today))
        .await?;
    Ok(upcoming(today, candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::repo::{memory::MemoryContactStore, ContactInput};
    use time::macros::date;
    use time::OffsetDateTime;

    fn contact(first: &str, birthday: Date) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            first_name: first.into(),
            last_name: "Ronaldo".into(),
            email: "cr7@gmail.com".into(),
            phone: "123123123".into(),
            birthday,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn names(cs: &[Contact]) -> Vec<&str> {
        cs.iter().map(|c| c.first_name.as_str()).collect()
    }

    #[test]
    fn window_includes_plus_three_excludes_minus_one() {
        let today = date!(2024 - 03 - 10);
        let found = upcoming(
            today,
            vec![
                contact("soon", date!(1985 - 03 - 13)),
                contact("yesterday", date!(1985 - 03 - 09)),
            ],
        );
        assert_eq!(names(&found), ["soon"]);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let today = date!(2024 - 03 - 10);
        let found = upcoming(
            today,
            vec![
                contact("today", date!(1990 - 03 - 10)),
                contact("last", date!(1990 - 03 - 17)),
                contact("past_end", date!(1990 - 03 - 18)),
            ],
        );
        assert_eq!(names(&found), ["today", "last"]);
    }

    #[test]
    fn window_spanning_month_end_sees_both_months() {
        let today = date!(2024 - 04 - 28);
        let found = upcoming(
            today,
            vec![
                contact("april", date!(1980 - 04 - 30)),
                contact("may", date!(1980 - 05 - 03)),
                contact("too_late", date!(1980 - 05 - 06)),
            ],
        );
        assert_eq!(names(&found), ["april", "may"]);
    }

    #[test]
    fn window_spanning_year_end_rolls_into_next_year() {
        let today = date!(2024 - 12 - 29);
        let found = upcoming(
            today,
            vec![
                contact("january", date!(1975 - 01 - 02)),
                contact("december", date!(1975 - 12 - 31)),
                contact("earlier", date!(1975 - 12 - 20)),
            ],
        );
        assert_eq!(names(&found), ["december", "january"]);
    }

    #[test]
    fn feb_29_is_observed_on_feb_28_in_common_years() {
        let leapling = date!(2000 - 02 - 29);
        assert_eq!(observed_in(leapling, 2023), Some(date!(2023 - 02 - 28)));
        assert_eq!(observed_in(leapling, 2024), Some(date!(2024 - 02 - 29)));

        let found = upcoming(date!(2023 - 02 - 25), vec![contact("leap", leapling)]);
        assert_eq!(names(&found), ["leap"]);
        assert!(window_codes(date!(2023 - 02 - 25)).contains(&229));
        assert!(!window_codes(date!(2024 - 02 - 10)).contains(&229));
    }

    #[test]
    fn window_codes_cover_eight_days() {
        let codes = window_codes(date!(2024 - 03 - 29));
        assert_eq!(codes, vec![329, 330, 331, 401, 402, 403, 404, 405]);
    }

    #[test]
    fn results_are_ordered_by_next_birthday() {
        let today = date!(2024 - 06 - 01);
        let found = upcoming(
            today,
            vec![
                contact("third", date!(1999 - 06 - 07)),
                contact("first", date!(1999 - 06 - 01)),
                contact("second", date!(2001 - 06 - 03)),
            ],
        );
        assert_eq!(names(&found), ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn lookup_is_scoped_to_owner() {
        let store = MemoryContactStore::default();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let input = ContactInput {
            first_name: "Artur".into(),
            last_name: "Ronaldo".into(),
            email: "cr7@gmail.com".into(),
            phone: "123123123".into(),
            birthday: date!(2023 - 03 - 15),
        };
        store.create(owner, input.clone()).await.unwrap();
        store.create(stranger, input).await.unwrap();

        let today = date!(2024 - 03 - 12);
        let found = upcoming_birthdays(&store, owner, today).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user_id, owner);
    }
}
