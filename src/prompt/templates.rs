//! Content type catalogue
//!
//! Each content type maps to exactly one template with a single
//! [`USER_PROMPT_SLOT`]. Templates are plain data; adding a content type means
//! adding an entry to [`CATALOGUE`] and nothing else.

use std::fmt;

/// Substitution point for the user's free-text prompt
pub const USER_PROMPT_SLOT: &str = "{user_prompt}";

/// Grouping used by front ends when listing content types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    CharactersAndLore,
    Scenes,
    Projects,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CharactersAndLore => "Characters & Lore",
            Self::Scenes => "Scenes",
            Self::Projects => "Projects",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentType {
    pub id: &'static str,
    pub display_name: &'static str,
    /// One-line summary with the usual length
    pub description: &'static str,
    /// A prompt that shows what a good request looks like
    pub example: &'static str,
    pub category: Category,
    /// Subdirectory of the output directory results are saved under
    pub subdir: &'static str,
    pub template: &'static str,
}

impl ContentType {
    /// Substitute the user prompt into the template's slot
    pub fn fill(&self, user_prompt: &str) -> String {
        self.template.replacen(USER_PROMPT_SLOT, user_prompt, 1)
    }
}

/// Look up a content type by identifier
pub fn lookup(id: &str) -> Option<&'static ContentType> {
    CATALOGUE.iter().find(|c| c.id == id)
}

/// Every known content type identifier, in catalogue order
pub fn identifiers() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|c| c.id)
}

pub static CATALOGUE: &[ContentType] = &[
    ContentType {
        id: "character",
        display_name: "Character Profile",
        description: "Full character profile: background, personality, skills, appearance and voice. Around 800 to 1200 words.",
        example: "Dwarf engineer in her forties, gruff but kind, lost her forge to a fire and wants to earn back her guild seat",
        category: Category::CharactersAndLore,
        subdir: "characters",
        template: CHARACTER,
    },
    ContentType {
        id: "magic",
        display_name: "Magic System",
        description: "Magic system with its source, rules, costs, progression and effect on society. Around 1000 to 1500 words.",
        example: "Magic drawn from the caster's own lifespan; every spell ages them, and the church hunts those who use it",
        category: Category::CharactersAndLore,
        subdir: "magic_systems",
        template: MAGIC,
    },
    ContentType {
        id: "science",
        display_name: "Science / Technology System",
        description: "Speculative technology with a plausible foundation, limits and consequences. Around 1000 to 1500 words.",
        example: "Faster-than-light travel through paired gates that take decades to build, so only empires can afford them",
        category: Category::CharactersAndLore,
        subdir: "science_systems",
        template: SCIENCE,
    },
    ContentType {
        id: "artifact",
        display_name: "Artifact or Relic",
        description: "Legendary item with its origin, powers, drawbacks and the trail of owners it left. Around 600 to 800 words.",
        example: "A sword that grants flawless swordsmanship but slowly replaces the wielder's memories with its maker's",
        category: Category::CharactersAndLore,
        subdir: "artifacts",
        template: ARTIFACT,
    },
    ContentType {
        id: "culture",
        display_name: "Culture",
        description: "Species or faction: society, beliefs, customs, economy and conflicts. Around 1200 to 1500 words.",
        example: "Nomads of a salt desert who farm dew with glass towers and pass leadership down the mother's line",
        category: Category::CharactersAndLore,
        subdir: "cultures",
        template: CULTURE,
    },
    ContentType {
        id: "relationships",
        display_name: "Relationship Map",
        description: "Web of relationships between several characters, with tensions and turning points. Around 800 to 1000 words.",
        example: "Five mercenaries: a mentor who sold out her student, two rival brothers and the outsider who keeps the peace",
        category: Category::CharactersAndLore,
        subdir: "relationships",
        template: RELATIONSHIPS,
    },
    ContentType {
        id: "concept",
        display_name: "Story Concept",
        description: "Complete concept document for a writing project: premise, cast, setting, arcs and themes. Around 2000 to 3000 words.",
        example: "Small-town autumn romance between a café owner and the reclusive writer who rents the room upstairs",
        category: Category::Projects,
        subdir: "concepts",
        template: CONCEPT,
    },
    ContentType {
        id: "scene-dialogue",
        display_name: "Dialogue Scene",
        description: "Conversation-driven scene carried by subtext and emotion. Around 500 to 800 words.",
        example: "Two former lovers meet again at a friend's wedding while a storm traps every guest inside",
        category: Category::Scenes,
        subdir: "scenes",
        template: SCENE_DIALOGUE,
    },
    ContentType {
        id: "scene-combat",
        display_name: "Combat Scene",
        description: "Action sequence with clear choreography and rising stakes. Around 600 to 1000 words.",
        example: "Duel on the deck of a burning ship; the hero is outmatched but buying time for escaping prisoners",
        category: Category::Scenes,
        subdir: "scenes",
        template: SCENE_COMBAT,
    },
    ContentType {
        id: "scene-general",
        display_name: "General Scene",
        description: "Narrative scene with setting, atmosphere and character development. Around 500 to 1000 words.",
        example: "An apprentice finds the hidden laboratory where her mentor has been running forbidden experiments",
        category: Category::Scenes,
        subdir: "scenes",
        template: SCENE_GENERAL,
    },
    ContentType {
        id: "scene-romance",
        display_name: "Romance Scene",
        description: "Romantic scene grounded in emotional connection and sensory detail. Around 800 to 1200 words.",
        example: "Two smugglers share a quiet night in a cramped cabin after barely surviving a customs raid",
        category: Category::Scenes,
        subdir: "scenes",
        template: SCENE_ROMANCE,
    },
    ContentType {
        id: "image-prompt",
        display_name: "Image Prompt",
        description: "Detailed prompt for an image generator covering subject, style, lighting and composition. Around 200 to 300 words.",
        example: "Street hacker with a neon mohawk and a patched leather jacket, lit by floating holographic screens",
        category: Category::Projects,
        subdir: "image_prompts",
        template: IMAGE_PROMPT,
    },
];

const CHARACTER: &str = "You are an expert writer building a character profile.

Create a complete character profile from this description:
{user_prompt}

Requirements:
- Basic information: full name, age, species or origin, appearance, role
- Personality: core traits, strengths, flaws, motivations, fears
- Background: birthplace, family, formative events, present situation
- Skills and abilities, including their limits
- Voice: speech patterns, mannerisms, emotional tells
- Arc potential and key relationships

Be specific and internally consistent.
Target length: 800-1200 words.

Character Profile:";

const MAGIC: &str = "You are an expert worldbuilder designing a magic system.

Design a complete magic system around this concept:
{user_prompt}

Requirements:
- Source of power and how practitioners access it
- Rules, costs and hard limits
- Schools, disciplines or tiers of mastery
- How society, law and religion respond to magic
- Notable practitioners and historical events
- Two or three story hooks the system creates

Costs and limits must be concrete enough to create conflict.
Target length: 1000-1500 words.

Magic System:";

const SCIENCE: &str = "You are a science fiction worldbuilder designing a technological system.

Design the technology described here:
{user_prompt}

Requirements:
- Underlying principle, explained plausibly
- Capabilities and known limitations
- Energy, materials and manufacturing constraints
- Who controls it and who is excluded
- Side effects, failure modes and accidents
- How daily life changed because of it

Target length: 1000-1500 words.

Technology System:";

const ARTIFACT: &str = "You are a fantasy writer designing a powerful artifact or relic.

Describe the artifact based on this idea:
{user_prompt}

Requirements:
- Name, appearance and materials
- Origin and maker
- Powers, activation and the price of using it
- Its history of owners and what became of them
- Current whereabouts and who is seeking it
- Legends that are false or only half true

Target length: 600-1000 words.

Artifact:";

const CULTURE: &str = "You are an expert worldbuilder describing a culture.

Describe the culture based on this premise:
{user_prompt}

Requirements:
- Geography and how it shaped the people
- Social structure, family and gender roles
- Beliefs, rituals and taboos
- Language, naming conventions and common sayings
- Food, clothing, art and architecture
- Relations with neighbouring peoples and current tensions

Target length: 1200-1800 words.

Culture:";

const RELATIONSHIPS: &str = "You are a narrative designer mapping relationships between characters.

Map the relationships in this cast:
{user_prompt}

Requirements:
- Each significant pair: how they met, what binds them, what divides them
- Power balance and how it is shifting
- Secrets one character keeps from another
- Likely turning points over the course of a story

Target length: 800-1200 words.

Relationship Map:";

const CONCEPT: &str = "You are a story developer writing a concept document for a full-length book.

Develop a story concept from this idea:
{user_prompt}

Requirements:
- Title, genre, intended audience and approximate length
- Premise in two or three sentences
- Protagonist: want, need, wound and arc
- Antagonistic force and what it wants
- Setting essentials
- Three-act outline with the major turning points
- Themes and the question the ending answers
- Prose style and point of view

Target length: 1500-2500 words.

Story Concept:";

const SCENE_DIALOGUE: &str = "You are a fiction writer crafting a dialogue-driven scene.

Write the scene described here:
{user_prompt}

Let subtext carry the conflict: characters rarely say exactly what they mean.
Give every speaker a distinct voice and keep dialogue tags simple.
Ground the conversation with small physical beats and setting details.
Target length: 1000-1500 words.

Scene:";

const SCENE_COMBAT: &str = "You are an action writer crafting a combat scene.

Write the fight described here:
{user_prompt}

Keep the choreography easy to follow and the stakes clear.
Use short sentences when the pace peaks and let the environment matter.
Show cost and consequence; nobody walks away untouched.
Target length: 1000-1500 words.

Scene:";

const SCENE_GENERAL: &str = "You are a versatile fiction writer crafting a narrative scene.

Write the scene described here:
{user_prompt}

Open in motion, stay in one point of view, and end on a change.
Use concrete sensory detail rather than summary.
Target length: 1000-1500 words.

Scene:";

const SCENE_ROMANCE: &str = "You are a romance writer crafting an emotionally charged scene.

Write the scene described here:
{user_prompt}

Build tension through what the characters notice about each other and what they hold back.
Keep both characters' agency and consent clear throughout.
Let the scene change the relationship in a way that cannot be undone.
Target length: 1000-1500 words.

Scene:";

const IMAGE_PROMPT: &str = "You are an expert at writing prompts for image generation models.

Write an image generation prompt for this subject:
{user_prompt}

Requirements:
- One dense paragraph of comma-separated descriptors
- Subject, pose, expression, clothing and props first
- Then setting, lighting, camera angle and art style
- Finish with a short negative prompt on its own line starting with 'Negative:'

Image Prompt:";
