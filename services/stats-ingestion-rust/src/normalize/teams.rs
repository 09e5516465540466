//! Team reference data, one ordered table per league.
//!
//! Table order is the tie-break for substring matching, so entries must stay
//! in a fixed order (alphabetical by full name here).

use crate::models::League;

pub struct TeamEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

const fn team(
    code: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
) -> TeamEntry {
    TeamEntry { code, name, aliases }
}

pub static NFL_TEAMS: &[TeamEntry] = &[
    team("ARI", "Arizona Cardinals", &["AZ", "Cardinals", "Arizona"]),
    team("ATL", "Atlanta Falcons", &["Falcons", "Atlanta"]),
    team("BAL", "Baltimore Ravens", &["Ravens", "Baltimore"]),
    team("BUF", "Buffalo Bills", &["Bills", "Buffalo"]),
    team("CAR", "Carolina Panthers", &["Panthers", "Carolina"]),
    team("CHI", "Chicago Bears", &["Bears", "Chicago"]),
    team("CIN", "Cincinnati Bengals", &["Bengals", "Cincinnati"]),
    team("CLE", "Cleveland Browns", &["Browns", "Cleveland"]),
    team("DAL", "Dallas Cowboys", &["Cowboys", "Dallas"]),
    team("DEN", "Denver Broncos", &["Broncos", "Denver"]),
    team("DET", "Detroit Lions", &["Lions", "Detroit"]),
    team("GB", "Green Bay Packers", &["GBP", "Packers", "Green Bay"]),
    team("HOU", "Houston Texans", &["Texans", "Houston"]),
    team("IND", "Indianapolis Colts", &["Colts", "Indianapolis"]),
    team("JAX", "Jacksonville Jaguars", &["JAC", "Jaguars", "Jacksonville"]),
    team("KC", "Kansas City Chiefs", &["KCC", "Chiefs", "Kansas City"]),
    team("LV", "Las Vegas Raiders", &["LVR", "Raiders", "Las Vegas", "Oakland Raiders"]),
    team("LAC", "Los Angeles Chargers", &["Chargers", "LA Chargers", "San Diego Chargers"]),
    team("LAR", "Los Angeles Rams", &["Rams", "LA Rams", "St. Louis Rams"]),
    team("MIA", "Miami Dolphins", &["Dolphins", "Miami"]),
    team("MIN", "Minnesota Vikings", &["Vikings", "Minnesota"]),
    team("NE", "New England Patriots", &["NEP", "Patriots", "New England"]),
    team("NO", "New Orleans Saints", &["NOS", "Saints", "New Orleans"]),
    team("NYG", "New York Giants", &["Giants", "NY Giants"]),
    team("NYJ", "New York Jets", &["Jets", "NY Jets"]),
    team("PHI", "Philadelphia Eagles", &["Eagles", "Philadelphia"]),
    team("PIT", "Pittsburgh Steelers", &["Steelers", "Pittsburgh"]),
    team("SF", "San Francisco 49ers", &["SFO", "49ers", "Niners", "San Francisco"]),
    team("SEA", "Seattle Seahawks", &["Seahawks", "Seattle"]),
    team("TB", "Tampa Bay Buccaneers", &["TBB", "Buccaneers", "Bucs", "Tampa Bay"]),
    team("TEN", "Tennessee Titans", &["Titans", "Tennessee"]),
    team("WAS", "Washington Commanders", &["WSH", "Commanders", "Washington"]),
];

pub static NBA_TEAMS: &[TeamEntry] = &[
    team("ATL", "Atlanta Hawks", &["Hawks", "Atlanta"]),
    team("BOS", "Boston Celtics", &["Celtics", "Boston"]),
    team("BKN", "Brooklyn Nets", &["BRK", "Nets", "Brooklyn"]),
    team("CHA", "Charlotte Hornets", &["CHO", "Hornets", "Charlotte"]),
    team("CHI", "Chicago Bulls", &["Bulls", "Chicago"]),
    team("CLE", "Cleveland Cavaliers", &["Cavaliers", "Cavs", "Cleveland"]),
    team("DAL", "Dallas Mavericks", &["Mavericks", "Mavs", "Dallas"]),
    team("DEN", "Denver Nuggets", &["Nuggets", "Denver"]),
    team("DET", "Detroit Pistons", &["Pistons", "Detroit"]),
    team("GSW", "Golden State Warriors", &["GS", "Warriors", "Golden State"]),
    team("HOU", "Houston Rockets", &["Rockets", "Houston"]),
    team("IND", "Indiana Pacers", &["Pacers", "Indiana"]),
    team("LAC", "Los Angeles Clippers", &["LA Clippers", "Clippers"]),
    team("LAL", "Los Angeles Lakers", &["LA Lakers", "Lakers"]),
    team("MEM", "Memphis Grizzlies", &["Grizzlies", "Memphis"]),
    team("MIA", "Miami Heat", &["Heat", "Miami"]),
    team("MIL", "Milwaukee Bucks", &["Bucks", "Milwaukee"]),
    team("MIN", "Minnesota Timberwolves", &["Timberwolves", "Wolves", "Minnesota"]),
    team("NOP", "New Orleans Pelicans", &["NO", "Pelicans", "New Orleans"]),
    team("NYK", "New York Knicks", &["NY", "Knicks"]),
    team("OKC", "Oklahoma City Thunder", &["Thunder", "Oklahoma City"]),
    team("ORL", "Orlando Magic", &["Magic", "Orlando"]),
    team("PHI", "Philadelphia 76ers", &["76ers", "Sixers", "Philadelphia"]),
    team("PHX", "Phoenix Suns", &["PHO", "Suns", "Phoenix"]),
    team("POR", "Portland Trail Blazers", &["Trail Blazers", "Blazers", "Portland"]),
    team("SAC", "Sacramento Kings", &["Kings", "Sacramento"]),
    team("SAS", "San Antonio Spurs", &["SA", "Spurs", "San Antonio"]),
    team("TOR", "Toronto Raptors", &["Raptors", "Toronto"]),
    team("UTA", "Utah Jazz", &["UTAH", "Jazz", "Utah"]),
    team("WAS", "Washington Wizards", &["WSH", "Wizards", "Washington"]),
];

pub static MLB_TEAMS: &[TeamEntry] = &[
    team("ARI", "Arizona Diamondbacks", &["AZ", "Diamondbacks", "D-backs"]),
    team("ATL", "Atlanta Braves", &["Braves", "Atlanta"]),
    team("BAL", "Baltimore Orioles", &["Orioles", "Baltimore"]),
    team("BOS", "Boston Red Sox", &["Red Sox", "Boston"]),
    team("CHC", "Chicago Cubs", &["Cubs"]),
    team("CWS", "Chicago White Sox", &["CHW", "White Sox"]),
    team("CIN", "Cincinnati Reds", &["Reds", "Cincinnati"]),
    team("CLE", "Cleveland Guardians", &["Guardians", "Cleveland"]),
    team("COL", "Colorado Rockies", &["Rockies", "Colorado"]),
    team("DET", "Detroit Tigers", &["Tigers", "Detroit"]),
    team("HOU", "Houston Astros", &["Astros", "Houston"]),
    team("KC", "Kansas City Royals", &["KCR", "Royals", "Kansas City"]),
    team("LAA", "Los Angeles Angels", &["Angels", "LA Angels"]),
    team("LAD", "Los Angeles Dodgers", &["Dodgers", "LA Dodgers"]),
    team("MIA", "Miami Marlins", &["Marlins", "Miami"]),
    team("MIL", "Milwaukee Brewers", &["Brewers", "Milwaukee"]),
    team("MIN", "Minnesota Twins", &["Twins", "Minnesota"]),
    team("NYM", "New York Mets", &["Mets", "NY Mets"]),
    team("NYY", "New York Yankees", &["Yankees", "NY Yankees"]),
    team("OAK", "Oakland Athletics", &["ATH", "Athletics", "A's", "Oakland"]),
    team("PHI", "Philadelphia Phillies", &["Phillies", "Philadelphia"]),
    team("PIT", "Pittsburgh Pirates", &["Pirates", "Pittsburgh"]),
    team("SD", "San Diego Padres", &["SDP", "Padres", "San Diego"]),
    team("SF", "San Francisco Giants", &["SFG", "Giants", "San Francisco"]),
    team("SEA", "Seattle Mariners", &["Mariners", "Seattle"]),
    team("STL", "St. Louis Cardinals", &["Cardinals", "St Louis"]),
    team("TB", "Tampa Bay Rays", &["TBR", "Rays", "Tampa Bay"]),
    team("TEX", "Texas Rangers", &["Rangers", "Texas"]),
    team("TOR", "Toronto Blue Jays", &["Blue Jays", "Toronto"]),
    team("WSH", "Washington Nationals", &["WAS", "Nationals", "Nats", "Washington"]),
];

pub static NHL_TEAMS: &[TeamEntry] = &[
    team("ANA", "Anaheim Ducks", &["Ducks", "Anaheim"]),
    team("ARI", "Arizona Coyotes", &["Coyotes", "Arizona"]),
    team("BOS", "Boston Bruins", &["Bruins", "Boston"]),
    team("BUF", "Buffalo Sabres", &["Sabres", "Buffalo"]),
    team("CGY", "Calgary Flames", &["Flames", "Calgary"]),
    team("CAR", "Carolina Hurricanes", &["Hurricanes", "Canes", "Carolina"]),
    team("CHI", "Chicago Blackhawks", &["Blackhawks", "Chicago"]),
    team("COL", "Colorado Avalanche", &["Avalanche", "Colorado"]),
    team("CBJ", "Columbus Blue Jackets", &["Blue Jackets", "Columbus"]),
    team("DAL", "Dallas Stars", &["Stars", "Dallas"]),
    team("DET", "Detroit Red Wings", &["Red Wings", "Detroit"]),
    team("EDM", "Edmonton Oilers", &["Oilers", "Edmonton"]),
    team("FLA", "Florida Panthers", &["Panthers", "Florida"]),
    team("LAK", "Los Angeles Kings", &["L.A", "LA", "Kings"]),
    team("MIN", "Minnesota Wild", &["Wild", "Minnesota"]),
    team("MTL", "Montreal Canadiens", &["Canadiens", "Habs", "Montreal"]),
    team("NSH", "Nashville Predators", &["Predators", "Preds", "Nashville"]),
    team("NJD", "New Jersey Devils", &["N.J", "NJ", "Devils", "New Jersey"]),
    team("NYI", "New York Islanders", &["Islanders"]),
    team("NYR", "New York Rangers", &["Rangers"]),
    team("OTT", "Ottawa Senators", &["Senators", "Sens", "Ottawa"]),
    team("PHI", "Philadelphia Flyers", &["Flyers", "Philadelphia"]),
    team("PIT", "Pittsburgh Penguins", &["Penguins", "Pens", "Pittsburgh"]),
    team("SJS", "San Jose Sharks", &["S.J", "SJ", "Sharks", "San Jose"]),
    team("SEA", "Seattle Kraken", &["Kraken", "Seattle"]),
    team("STL", "St. Louis Blues", &["Blues", "St Louis"]),
    team("TBL", "Tampa Bay Lightning", &["T.B", "TB", "Lightning", "Tampa Bay"]),
    team("TOR", "Toronto Maple Leafs", &["Maple Leafs", "Leafs", "Toronto"]),
    team("UTA", "Utah Hockey Club", &["Utah"]),
    team("VAN", "Vancouver Canucks", &["Canucks", "Vancouver"]),
    team("VGK", "Vegas Golden Knights", &["VEG", "Golden Knights", "Vegas"]),
    team("WSH", "Washington Capitals", &["WAS", "Capitals", "Caps", "Washington"]),
    team("WPG", "Winnipeg Jets", &["Jets", "Winnipeg"]),
];

pub fn teams_for(league: League) -> &'static [TeamEntry] {
    match league {
        League::Nfl => NFL_TEAMS,
        League::Nba => NBA_TEAMS,
        League::Mlb => MLB_TEAMS,
        League::Nhl => NHL_TEAMS,
    }
}

/// Whether `code` is a canonical code for the league.
pub fn is_known_code(league: League, code: &str) -> bool {
    teams_for(league).iter().any(|t| t.code == code)
}
