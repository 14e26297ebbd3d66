use chrono::{Datelike, Local, Weekday};
use rand::seq::SliceRandom;

struct Tune {
    title: &'static str,
    url: &'static str,
}

const FRIDAY: &[Tune] = &[
    Tune {
        title: "Bruce Hornsby & the Range - The Way It Is",
        url: "http://youtu.be/4-k2JCV4TCs",
    },
    Tune {
        title: "2 Unlimited - No Limit",
        url: "http://youtu.be/RkEXGgdqMz8",
    },
];

const WEEKDAY: &[Tune] = &[
    Tune {
        title: "Kool & The Gang - Get Down On It",
        url: "http://youtu.be/qchPLaiKocI",
    },
    Tune {
        title: "Chic - Everybody Dance",
        url: "http://youtu.be/J1MMzMGX8xY",
    },
    Tune {
        title: "Boney M - Rasputin",
        url: "http://youtu.be/9_T3x8qBoic",
    },
    Tune {
        title: "Jamiroquai - Cosmic Girl",
        url: "http://youtu.be/D-NvQ6VJYtE",
    },
];

fn playlist(day: Weekday) -> &'static [Tune] {
    if day == Weekday::Fri {
        FRIDAY
    } else {
        WEEKDAY
    }
}

pub fn party() {
    let tunes = playlist(Local::now().weekday());
    println!("Millitaa [SC]haniqua calls for party time, fellas!");
    if let Some(tune) = tunes.choose(&mut rand::thread_rng()) {
        println!("{} - {}", tune.title, tune.url);
    }
}
